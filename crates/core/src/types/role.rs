//! Application roles and their normalization.
//!
//! The `users.role` column is free text written by several generations of
//! intake forms and admin tooling, so the same role appears as `admin`,
//! `ADMIN`, `super_admin`, `sales_rep`, `salesperson`, and so on. Every role
//! comparison in the portal goes through [`Role::normalize`]; nothing else
//! compares role strings.

use serde::{Deserialize, Serialize};

/// Canonical application role.
///
/// The four roles the route guard distinguishes. Anything the directory
/// holds that does not normalize to one of these is treated as "no role",
/// which every guard rule denies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Full access to the back office and every dashboard.
    Admin,
    /// Office staff: back-office access short of user management.
    Staff,
    /// Sales reps: lead funnel and the sales dashboard.
    Sales,
    /// Customers: their own project portal only.
    Customer,
}

impl Role {
    /// Normalize a raw directory role string to a canonical role.
    ///
    /// Trims, lower-cases, then maps the synonyms present in the data.
    /// Returns `None` for anything unrecognized - an unknown role string is
    /// never an implicit allow.
    #[must_use]
    pub fn normalize(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "admin" | "super_admin" | "superadmin" => Some(Self::Admin),
            "staff" => Some(Self::Staff),
            "sales" | "sales_rep" | "sales_person" | "salesperson" => Some(Self::Sales),
            "customer" | "client" => Some(Self::Customer),
            _ => None,
        }
    }

    /// The canonical lower-case token for this role.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Staff => "staff",
            Self::Sales => "sales",
            Self::Customer => "customer",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::normalize(s).ok_or_else(|| format!("unknown role: {s}"))
    }
}

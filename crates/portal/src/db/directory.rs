//! User directory lookups.
//!
//! The directory is a single `users` table keyed by email. The session layer
//! only needs the role column, but the profile fields ride along for the
//! dashboards. Lookups are by the lower-cased email: the provider and the
//! intake forms disagree on casing, and the directory was populated by both.

use async_trait::async_trait;
use sqlx::PgPool;

use armorfloor_core::Email;

use super::RepositoryError;

/// A directory row for one application user.
///
/// `role` is the raw stored string; normalization happens in the session
/// layer through `Role::normalize`, never here.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DirectoryProfile {
    /// Raw role string as stored. May be any casing or synonym, or NULL for
    /// an account still being provisioned.
    pub role: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    /// Soft-delete flag; an inactive row still resolves (deactivation is
    /// enforced at sign-in, not in the directory).
    pub is_active: Option<bool>,
}

/// The directory lookup surface the session layer consumes.
#[async_trait]
pub trait RoleDirectory: Send + Sync {
    /// Look up the directory row for an email.
    ///
    /// Returns `Ok(None)` when no row exists - a missing row is the normal
    /// "still provisioning" case, distinct from a transport error.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError`] when the query fails.
    async fn profile_by_email(
        &self,
        email: &Email,
    ) -> Result<Option<DirectoryProfile>, RepositoryError>;
}

/// `PostgreSQL`-backed directory.
#[derive(Debug, Clone)]
pub struct PgDirectory {
    pool: PgPool,
}

impl PgDirectory {
    /// Create a new directory over a connection pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RoleDirectory for PgDirectory {
    async fn profile_by_email(
        &self,
        email: &Email,
    ) -> Result<Option<DirectoryProfile>, RepositoryError> {
        let profile = sqlx::query_as::<_, DirectoryProfile>(
            r"
            SELECT role, first_name, last_name, is_active
            FROM users
            WHERE lower(email) = $1
            ",
        )
        .bind(email.normalized())
        .fetch_optional(&self.pool)
        .await?;

        Ok(profile)
    }
}

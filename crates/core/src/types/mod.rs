//! Core types for the Armorfloor portal.
//!
//! This module provides type-safe wrappers for the domain concepts shared
//! between the session layer and the route guard.

pub mod email;
pub mod id;
pub mod role;

pub use email::{Email, EmailError};
pub use id::*;
pub use role::Role;

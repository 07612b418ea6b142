//! Database operations for the portal's `PostgreSQL` instance.
//!
//! The portal owns a single schema. The table the auth layer cares about is
//! `users` - the application-level user directory mapping provider identities
//! (by email) to a role and profile. Leads, quotes, and project rows live in
//! the same database but are read and written by their own route handlers.

mod directory;

pub use directory::{DirectoryProfile, PgDirectory, RoleDirectory};

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

/// Errors from repository operations.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    /// The query itself failed (connection, timeout, constraint).
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A row decoded but its content violates a domain invariant.
    #[error("data corruption: {0}")]
    DataCorruption(String),
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// The pool is lazy: no connection is made until the first query, so startup
/// does not depend on the database being reachable.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection string cannot be parsed.
pub fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect_lazy(database_url.expose_secret())
}

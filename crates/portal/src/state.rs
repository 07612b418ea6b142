//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::PortalConfig;
use crate::db::RoleDirectory;
use crate::identity::IdentityProvider;
use crate::session::SessionManager;

/// Application state shared across all handlers.
///
/// Cheaply cloneable via `Arc`. The identity provider and the directory are
/// held as trait objects so the integration tests can stand the full router
/// up against fakes.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: PortalConfig,
    pool: PgPool,
    identity: Arc<dyn IdentityProvider>,
    directory: Arc<dyn RoleDirectory>,
    sessions: SessionManager,
}

impl AppState {
    /// Create a new application state over the given collaborators.
    #[must_use]
    pub fn new(
        config: PortalConfig,
        pool: PgPool,
        identity: Arc<dyn IdentityProvider>,
        directory: Arc<dyn RoleDirectory>,
    ) -> Self {
        let sessions = SessionManager::new(
            identity.clone(),
            directory.clone(),
            config.session.clone(),
        );

        Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                identity,
                directory,
                sessions,
            }),
        }
    }

    /// Get a reference to the portal configuration.
    #[must_use]
    pub fn config(&self) -> &PortalConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// Get a reference to the identity provider client.
    #[must_use]
    pub fn identity(&self) -> &Arc<dyn IdentityProvider> {
        &self.inner.identity
    }

    /// Get a reference to the user directory.
    #[must_use]
    pub fn directory(&self) -> &Arc<dyn RoleDirectory> {
        &self.inner.directory
    }

    /// Get a reference to the session manager.
    #[must_use]
    pub fn sessions(&self) -> &SessionManager {
        &self.inner.sessions
    }
}

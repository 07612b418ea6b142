//! Session validation and recovery.
//!
//! This is the authoritative answer to "who is making this request, and what
//! are they allowed to see". Every inbound request gets a fresh
//! [`SessionState`] computed from the identity provider and the user
//! directory; nothing is cached server-side beyond the provider's own
//! session store.
//!
//! Both collaborators are network dependencies of a third party, so this
//! layer is built to degrade instead of crash: transient identity failures
//! are retried with backoff on the client path, and exhausted retries
//! produce a well-formed unauthenticated state carrying the error instead of
//! a 500.

pub mod activity;

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use armorfloor_core::{Email, Role, UserId};

use crate::db::RoleDirectory;
use crate::identity::{AuthTransportError, Identity, IdentityProvider};

/// Base delay for exponential recovery backoff: attempt `n` waits `2^n` of
/// these before calling refresh.
const RECOVERY_BASE_DELAY: Duration = Duration::from_secs(1);

/// Linear backoff step between directory lookup attempts.
const ROLE_RETRY_STEP: Duration = Duration::from_millis(500);

/// Directory lookup attempts before giving up on the role.
const ROLE_MAX_ATTEMPTS: u32 = 3;

/// Tuning for session validation and recovery.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Client-side idle window before forced logout.
    pub max_inactivity: Duration,
    /// How close to expiry the client refreshes proactively.
    pub refresh_threshold: Duration,
    /// Recovery attempts before giving up on a broken client session.
    pub max_retries: u32,
    /// When true, provider failures produce a degraded [`SessionState`]
    /// instead of propagating.
    pub graceful_degradation: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_inactivity: Duration::from_secs(30 * 60),
            refresh_threshold: Duration::from_secs(5 * 60),
            max_retries: 3,
            graceful_degradation: true,
        }
    }
}

/// Where a validation runs; recovery is only attempted on the client path,
/// where a refresh token is at hand and a retry loop cannot stall a shared
/// serving thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationContext {
    /// Request handling on the server.
    Server,
    /// The browser context (session bootstrap, periodic re-checks).
    Client,
}

/// The provider token pair as presented by the request.
///
/// Read from the `af-access-token` / `af-refresh-token` cookies; this pair is
/// the only shared mutable state between requests, and the browser's cookie
/// store serializes writes to it.
///
/// Implements `Debug` manually to redact the tokens.
#[derive(Clone, Default)]
pub struct SessionTokens {
    /// Bearer token for provider calls, if the request presented one.
    pub access: Option<String>,
    /// Refresh token, used only by client-side recovery.
    pub refresh: Option<String>,
}

impl SessionTokens {
    /// Tokens for a request that presented no credentials.
    #[must_use]
    pub const fn anonymous() -> Self {
        Self {
            access: None,
            refresh: None,
        }
    }
}

impl std::fmt::Debug for SessionTokens {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionTokens")
            .field("access", &self.access.as_ref().map(|_| "[REDACTED]"))
            .field("refresh", &self.refresh.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Point-in-time authentication/authorization snapshot.
///
/// Invariants, enforced by the constructors (states are replaced whole,
/// never field-patched):
/// - `is_authenticated` iff `user` is present
/// - `error` only on a degraded state, never alongside an authenticated one
/// - `role` may be `None` even when authenticated (directory row missing or
///   still provisioning); every guard rule treats that as deny
#[derive(Debug, Clone, Serialize)]
pub struct SessionState {
    pub user: Option<Identity>,
    pub role: Option<Role>,
    pub is_authenticated: bool,
    pub last_activity: DateTime<Utc>,
    pub session_id: Option<UserId>,
    pub error: Option<String>,
}

impl SessionState {
    /// A fully authenticated session.
    #[must_use]
    pub fn authenticated(user: Identity, role: Option<Role>) -> Self {
        let session_id = Some(user.id);
        Self {
            user: Some(user),
            role,
            is_authenticated: true,
            last_activity: Utc::now(),
            session_id,
            error: None,
        }
    }

    /// The normal anonymous state: no session, no error.
    #[must_use]
    pub fn anonymous() -> Self {
        Self {
            user: None,
            role: None,
            is_authenticated: false,
            last_activity: Utc::now(),
            session_id: None,
            error: None,
        }
    }

    /// Unauthenticated because a dependency failed; carries the message.
    #[must_use]
    pub fn degraded(error: impl Into<String>) -> Self {
        Self {
            user: None,
            role: None,
            is_authenticated: false,
            last_activity: Utc::now(),
            session_id: None,
            error: Some(error.into()),
        }
    }
}

/// Produces [`SessionState`] values from the identity provider and the
/// directory.
///
/// Collaborators are constructor-injected so tests supply fakes, and retry
/// counters are local to each call - concurrent validations never share
/// backoff state.
#[derive(Clone)]
pub struct SessionManager {
    identity: Arc<dyn IdentityProvider>,
    directory: Arc<dyn RoleDirectory>,
    config: SessionConfig,
}

impl SessionManager {
    /// Create a manager over the given collaborators.
    #[must_use]
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        directory: Arc<dyn RoleDirectory>,
        config: SessionConfig,
    ) -> Self {
        Self {
            identity,
            directory,
            config,
        }
    }

    /// The active session configuration.
    #[must_use]
    pub const fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Validate the session behind a token pair.
    ///
    /// Identity is checked first; the role is only resolved for a confirmed
    /// identity. With graceful degradation enabled (the default) this never
    /// fails on provider trouble - it returns a degraded state instead.
    ///
    /// # Errors
    ///
    /// Returns [`AuthTransportError`] only when graceful degradation is
    /// disabled and the provider could not be reached.
    pub async fn validate(
        &self,
        context: ValidationContext,
        tokens: &SessionTokens,
    ) -> Result<SessionState, AuthTransportError> {
        let Some(access) = tokens.access.as_deref() else {
            return Ok(SessionState::anonymous());
        };

        match self.identity.get_user(access).await {
            Ok(Some(user)) => {
                let role = self.resolve_role(&user.email).await;
                Ok(SessionState::authenticated(user, role))
            }
            Ok(None) => Ok(SessionState::anonymous()),
            Err(err) => {
                tracing::warn!(
                    context = ?context,
                    error = %err,
                    "identity check failed during session validation"
                );

                if context == ValidationContext::Client
                    && let Some(recovered) = self.attempt_recovery(tokens).await
                {
                    return Ok(recovered);
                }

                if self.config.graceful_degradation {
                    Ok(SessionState::degraded(err.to_string()))
                } else {
                    Err(err)
                }
            }
        }
    }

    /// Try to rebuild a broken client session via token refresh.
    ///
    /// Attempt `n` (0-indexed) sleeps `2^n * 1s` before calling refresh. A
    /// successful refresh re-fetches the identity through the fresh access
    /// token and resolves the role. Every failure on this path is caught and
    /// logged; the caller only ever sees `Some(state)` or `None`.
    async fn attempt_recovery(&self, tokens: &SessionTokens) -> Option<SessionState> {
        let refresh = tokens.refresh.as_deref()?;

        for attempt in 0..self.config.max_retries {
            tokio::time::sleep(RECOVERY_BASE_DELAY * 2u32.saturating_pow(attempt)).await;

            let session = match self.identity.refresh_session(refresh).await {
                Ok(session) => session,
                Err(err) => {
                    tracing::warn!(attempt, error = %err, "session refresh attempt failed");
                    continue;
                }
            };

            // The provider rotated the pair; confirm the identity through
            // the fresh access token before trusting it.
            match self.identity.get_user(&session.access_token).await {
                Ok(Some(user)) => {
                    let role = self.resolve_role(&user.email).await;
                    tracing::info!(attempt, "session recovered after refresh");
                    return Some(SessionState::authenticated(user, role));
                }
                Ok(None) => {
                    tracing::warn!(attempt, "refresh succeeded but no identity came back");
                }
                Err(err) => {
                    tracing::warn!(attempt, error = %err, "identity re-check failed after refresh");
                }
            }
        }

        None
    }

    /// Resolve the directory role for an identity, tolerating transient
    /// lookup failure.
    ///
    /// Up to [`ROLE_MAX_ATTEMPTS`] lookups with a linear `500ms * attempt`
    /// backoff between them. A missing row, a NULL role, or an unrecognized
    /// role string all resolve to `None` without retrying - only transport
    /// errors are retried. Exhaustion returns `None`; an unresolved role is
    /// "no role", not a failed validation.
    async fn resolve_role(&self, email: &Email) -> Option<Role> {
        let mut attempts = 0u32;

        loop {
            attempts += 1;

            match self.directory.profile_by_email(email).await {
                Ok(Some(profile)) => {
                    let raw = profile.role?;
                    let role = Role::normalize(&raw);
                    if role.is_none() {
                        tracing::warn!(
                            raw = %raw,
                            "directory role did not normalize; treating as none"
                        );
                    }
                    return role;
                }
                Ok(None) => return None,
                Err(err) => {
                    if attempts >= ROLE_MAX_ATTEMPTS {
                        tracing::error!(
                            email = %email,
                            attempts,
                            error = %err,
                            "role resolution exhausted retries"
                        );
                        return None;
                    }
                    tracing::warn!(
                        email = %email,
                        attempt = attempts,
                        error = %err,
                        "role lookup failed; retrying"
                    );
                    tokio::time::sleep(ROLE_RETRY_STEP * attempts).await;
                }
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;

    use armorfloor_core::Email;

    use super::*;
    use crate::db::{DirectoryProfile, RepositoryError, RoleDirectory};
    use crate::identity::{NewUser, ProviderSession};

    fn identity_fixture() -> Identity {
        Identity {
            id: uuid::Uuid::from_u128(0x6a1f_50f4).into(),
            email: Email::parse("crew@armorfloorsystems.com").unwrap(),
        }
    }

    fn session_fixture() -> ProviderSession {
        ProviderSession {
            access_token: "fresh-access".to_owned(),
            refresh_token: "fresh-refresh".to_owned(),
            expires_in: 3600,
            user: identity_fixture(),
        }
    }

    fn transport_err() -> AuthTransportError {
        AuthTransportError::Provider {
            status: 503,
            message: "upstream timeout".to_owned(),
        }
    }

    fn tokens() -> SessionTokens {
        SessionTokens {
            access: Some("access".to_owned()),
            refresh: Some("refresh".to_owned()),
        }
    }

    /// Identity fake driven by scripted per-call results.
    #[derive(Default)]
    struct ScriptedIdentity {
        get_user: Mutex<VecDeque<Result<Option<Identity>, AuthTransportError>>>,
        refresh: Mutex<VecDeque<Result<ProviderSession, AuthTransportError>>>,
        get_user_calls: AtomicU32,
        refresh_calls: AtomicU32,
    }

    impl ScriptedIdentity {
        fn on_get_user(self, result: Result<Option<Identity>, AuthTransportError>) -> Self {
            self.get_user.lock().unwrap().push_back(result);
            self
        }

        fn on_refresh(self, result: Result<ProviderSession, AuthTransportError>) -> Self {
            self.refresh.lock().unwrap().push_back(result);
            self
        }
    }

    #[async_trait]
    impl IdentityProvider for ScriptedIdentity {
        async fn get_user(&self, _access: &str) -> Result<Option<Identity>, AuthTransportError> {
            self.get_user_calls.fetch_add(1, Ordering::SeqCst);
            self.get_user
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(transport_err()))
        }

        async fn sign_in_with_password(
            &self,
            _email: &Email,
            _password: &str,
        ) -> Result<ProviderSession, AuthTransportError> {
            Err(transport_err())
        }

        async fn refresh_session(
            &self,
            _refresh: &str,
        ) -> Result<ProviderSession, AuthTransportError> {
            self.refresh_calls.fetch_add(1, Ordering::SeqCst);
            self.refresh
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(transport_err()))
        }

        async fn sign_out(&self, _access: &str) -> Result<(), AuthTransportError> {
            Ok(())
        }

        async fn sign_up(&self, _new_user: NewUser) -> Result<Identity, AuthTransportError> {
            Err(transport_err())
        }
    }

    /// Directory fake returning a fixed outcome, counting calls.
    struct FixedDirectory {
        /// `Ok(role-string)` rows, `Err(())` simulates a transport failure.
        outcome: Result<Option<&'static str>, ()>,
        calls: AtomicU32,
    }

    impl FixedDirectory {
        fn with_role(role: &'static str) -> Self {
            Self {
                outcome: Ok(Some(role)),
                calls: AtomicU32::new(0),
            }
        }

        fn missing() -> Self {
            Self {
                outcome: Ok(None),
                calls: AtomicU32::new(0),
            }
        }

        fn failing() -> Self {
            Self {
                outcome: Err(()),
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl RoleDirectory for FixedDirectory {
        async fn profile_by_email(
            &self,
            _email: &Email,
        ) -> Result<Option<DirectoryProfile>, RepositoryError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.outcome {
                Ok(row) => Ok(row.map(|role| DirectoryProfile {
                    role: Some(role.to_owned()),
                    first_name: None,
                    last_name: None,
                    is_active: Some(true),
                })),
                Err(()) => Err(RepositoryError::Database(sqlx::Error::PoolTimedOut)),
            }
        }
    }

    fn manager(
        identity: ScriptedIdentity,
        directory: FixedDirectory,
        config: SessionConfig,
    ) -> (SessionManager, Arc<ScriptedIdentity>, Arc<FixedDirectory>) {
        let identity = Arc::new(identity);
        let directory = Arc::new(directory);
        let manager = SessionManager::new(identity.clone(), directory.clone(), config);
        (manager, identity, directory)
    }

    #[tokio::test]
    async fn test_no_access_token_is_anonymous_without_provider_call() {
        let (manager, identity, _) = manager(
            ScriptedIdentity::default(),
            FixedDirectory::missing(),
            SessionConfig::default(),
        );

        let state = manager
            .validate(ValidationContext::Server, &SessionTokens::anonymous())
            .await
            .unwrap();

        assert!(!state.is_authenticated);
        assert!(state.user.is_none());
        assert!(state.error.is_none());
        assert_eq!(identity.get_user_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_provider_reports_no_user_is_anonymous() {
        let (manager, _, _) = manager(
            ScriptedIdentity::default().on_get_user(Ok(None)),
            FixedDirectory::missing(),
            SessionConfig::default(),
        );

        let state = manager
            .validate(ValidationContext::Server, &tokens())
            .await
            .unwrap();

        assert!(!state.is_authenticated);
        assert!(state.error.is_none());
    }

    #[tokio::test]
    async fn test_authenticated_session_resolves_and_normalizes_role() {
        let (manager, _, directory) = manager(
            ScriptedIdentity::default().on_get_user(Ok(Some(identity_fixture()))),
            FixedDirectory::with_role("ADMIN"),
            SessionConfig::default(),
        );

        let state = manager
            .validate(ValidationContext::Server, &tokens())
            .await
            .unwrap();

        assert!(state.is_authenticated);
        assert_eq!(state.role, Some(Role::Admin));
        assert_eq!(state.session_id, state.user.map(|u| u.id));
        assert!(state.error.is_none());
        assert_eq!(directory.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unknown_role_string_resolves_to_none() {
        let (manager, _, _) = manager(
            ScriptedIdentity::default().on_get_user(Ok(Some(identity_fixture()))),
            FixedDirectory::with_role("warehouse"),
            SessionConfig::default(),
        );

        let state = manager
            .validate(ValidationContext::Server, &tokens())
            .await
            .unwrap();

        // Authenticated with no role is a valid state; the guard denies it.
        assert!(state.is_authenticated);
        assert_eq!(state.role, None);
    }

    #[tokio::test]
    async fn test_missing_directory_row_is_not_retried() {
        let (manager, _, directory) = manager(
            ScriptedIdentity::default().on_get_user(Ok(Some(identity_fixture()))),
            FixedDirectory::missing(),
            SessionConfig::default(),
        );

        let state = manager
            .validate(ValidationContext::Server, &tokens())
            .await
            .unwrap();

        assert!(state.is_authenticated);
        assert_eq!(state.role, None);
        assert_eq!(directory.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_role_resolution_makes_exactly_max_attempts_then_yields_none() {
        let (manager, _, directory) = manager(
            ScriptedIdentity::default().on_get_user(Ok(Some(identity_fixture()))),
            FixedDirectory::failing(),
            SessionConfig::default(),
        );

        let state = manager
            .validate(ValidationContext::Server, &tokens())
            .await
            .unwrap();

        assert!(state.is_authenticated);
        assert_eq!(state.role, None);
        assert_eq!(directory.calls.load(Ordering::SeqCst), ROLE_MAX_ATTEMPTS);
    }

    #[tokio::test]
    async fn test_server_transport_error_degrades_gracefully() {
        let (manager, _, _) = manager(
            ScriptedIdentity::default().on_get_user(Err(transport_err())),
            FixedDirectory::missing(),
            SessionConfig::default(),
        );

        let state = manager
            .validate(ValidationContext::Server, &tokens())
            .await
            .unwrap();

        assert!(!state.is_authenticated);
        assert!(state.user.is_none());
        let error = state.error.unwrap();
        assert!(error.contains("upstream timeout"));
    }

    #[tokio::test]
    async fn test_transport_error_propagates_when_degradation_disabled() {
        let config = SessionConfig {
            graceful_degradation: false,
            ..SessionConfig::default()
        };
        let (manager, _, _) = manager(
            ScriptedIdentity::default().on_get_user(Err(transport_err())),
            FixedDirectory::missing(),
            config,
        );

        let result = manager.validate(ValidationContext::Server, &tokens()).await;

        assert!(matches!(
            result,
            Err(AuthTransportError::Provider { status: 503, .. })
        ));
    }

    #[tokio::test]
    async fn test_server_context_never_attempts_recovery() {
        let (manager, identity, _) = manager(
            ScriptedIdentity::default().on_get_user(Err(transport_err())),
            FixedDirectory::missing(),
            SessionConfig::default(),
        );

        let _ = manager
            .validate(ValidationContext::Server, &tokens())
            .await
            .unwrap();

        assert_eq!(identity.refresh_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_client_recovery_succeeds_after_refresh() {
        let (manager, identity, _) = manager(
            ScriptedIdentity::default()
                .on_get_user(Err(transport_err()))
                .on_get_user(Ok(Some(identity_fixture())))
                .on_refresh(Ok(session_fixture())),
            FixedDirectory::with_role("sales_rep"),
            SessionConfig::default(),
        );

        let state = manager
            .validate(ValidationContext::Client, &tokens())
            .await
            .unwrap();

        assert!(state.is_authenticated);
        assert_eq!(state.role, Some(Role::Sales));
        assert!(state.error.is_none());
        assert_eq!(identity.refresh_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_client_recovery_exhaustion_degrades_with_original_error() {
        let (manager, identity, _) = manager(
            ScriptedIdentity::default().on_get_user(Err(transport_err())),
            FixedDirectory::missing(),
            SessionConfig::default(),
        );

        let state = manager
            .validate(ValidationContext::Client, &tokens())
            .await
            .unwrap();

        assert!(!state.is_authenticated);
        assert!(state.error.unwrap().contains("upstream timeout"));
        // one refresh per attempt, none after exhaustion
        assert_eq!(
            identity.refresh_calls.load(Ordering::SeqCst),
            SessionConfig::default().max_retries
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovery_backoff_is_exponential() {
        let (manager, _, _) = manager(
            ScriptedIdentity::default().on_get_user(Err(transport_err())),
            FixedDirectory::missing(),
            SessionConfig::default(),
        );

        let started = tokio::time::Instant::now();
        let _ = manager
            .validate(ValidationContext::Client, &tokens())
            .await
            .unwrap();

        // attempts 0, 1, 2 wait 1s, 2s, 4s respectively
        assert!(started.elapsed() >= Duration::from_secs(7));
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovery_without_refresh_token_degrades_immediately() {
        let (manager, identity, _) = manager(
            ScriptedIdentity::default().on_get_user(Err(transport_err())),
            FixedDirectory::missing(),
            SessionConfig::default(),
        );

        let state = manager
            .validate(
                ValidationContext::Client,
                &SessionTokens {
                    access: Some("access".to_owned()),
                    refresh: None,
                },
            )
            .await
            .unwrap();

        assert!(!state.is_authenticated);
        assert!(state.error.is_some());
        assert_eq!(identity.refresh_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_validate_is_idempotent_over_stable_provider_state() {
        let (manager, _, _) = manager(
            ScriptedIdentity::default()
                .on_get_user(Ok(Some(identity_fixture())))
                .on_get_user(Ok(Some(identity_fixture()))),
            FixedDirectory::with_role("customer"),
            SessionConfig::default(),
        );

        let first = manager
            .validate(ValidationContext::Server, &tokens())
            .await
            .unwrap();
        let second = manager
            .validate(ValidationContext::Server, &tokens())
            .await
            .unwrap();

        assert_eq!(first.is_authenticated, second.is_authenticated);
        assert_eq!(first.role, second.role);
        assert_eq!(first.session_id, second.session_id);
        // timestamps may differ; the authorization-relevant fields may not
    }
}

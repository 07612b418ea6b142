//! Identity provider client.
//!
//! The portal does not verify passwords or mint sessions itself - that is
//! delegated to a hosted identity service. This module defines the trait the
//! rest of the portal programs against, so the session layer and the tests
//! can swap the real HTTP client for fakes.

mod gotrue;

pub use gotrue::GoTrueClient;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use armorfloor_core::{Email, UserId};

/// An authenticated identity as reported by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    /// Opaque subject id issued by the provider.
    pub id: UserId,
    /// The email the identity was registered with.
    pub email: Email,
}

/// A provider-issued session: token pair plus the identity it belongs to.
///
/// Implements `Debug` manually to redact the tokens.
#[derive(Clone)]
pub struct ProviderSession {
    /// Bearer token for authenticated provider calls.
    pub access_token: String,
    /// Token used to mint a fresh access token.
    pub refresh_token: String,
    /// Access token lifetime in seconds.
    pub expires_in: u64,
    /// The identity this session belongs to.
    pub user: Identity,
}

impl std::fmt::Debug for ProviderSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderSession")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("expires_in", &self.expires_in)
            .field("user", &self.user)
            .finish()
    }
}

/// Registration payload passed through to the provider.
///
/// The profile fields land in the provider's user metadata; the directory row
/// is provisioned from them asynchronously, which is why a fresh account can
/// be authenticated with no role yet.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: Email,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub role: String,
}

/// Errors from the identity provider transport.
///
/// A 401 from the provider is NOT one of these - "no valid session" is the
/// normal anonymous case and surfaces as `Ok(None)` from
/// [`IdentityProvider::get_user`].
#[derive(Debug, Error)]
pub enum AuthTransportError {
    /// The HTTP request itself failed (DNS, connect, timeout).
    #[error("identity provider unreachable: {0}")]
    Http(#[from] reqwest::Error),

    /// The provider answered with a non-success status.
    #[error("identity provider error ({status}): {message}")]
    Provider {
        /// HTTP status code returned by the provider.
        status: u16,
        /// Short provider-supplied message.
        message: String,
    },

    /// The provider answered 2xx but the body did not parse.
    #[error("identity provider returned a malformed response: {0}")]
    Malformed(String),
}

impl AuthTransportError {
    /// Whether this failure came back as a 4xx, i.e. the request was
    /// understood and rejected rather than lost in transit.
    #[must_use]
    pub const fn is_rejection(&self) -> bool {
        matches!(self, Self::Provider { status, .. } if *status < 500)
    }
}

/// The identity provider surface the portal consumes.
///
/// All methods are pure passthroughs to the hosted service; retries and
/// degradation policy live in the session layer, not here.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Fetch the identity behind an access token.
    ///
    /// Returns `Ok(None)` when the token is missing, expired, or revoked
    /// (the provider's 401) - that is the anonymous case, not an error.
    ///
    /// # Errors
    ///
    /// Returns [`AuthTransportError`] when the provider is unreachable or
    /// answers outside its contract.
    async fn get_user(&self, access_token: &str) -> Result<Option<Identity>, AuthTransportError>;

    /// Verify a password and mint a session.
    ///
    /// # Errors
    ///
    /// Invalid credentials surface as a `Provider` error with a 4xx status;
    /// use [`AuthTransportError::is_rejection`] to tell them from outages.
    async fn sign_in_with_password(
        &self,
        email: &Email,
        password: &str,
    ) -> Result<ProviderSession, AuthTransportError>;

    /// Exchange a refresh token for a fresh session.
    ///
    /// # Errors
    ///
    /// Returns [`AuthTransportError`] on transport failure or if the refresh
    /// token is no longer honored.
    async fn refresh_session(
        &self,
        refresh_token: &str,
    ) -> Result<ProviderSession, AuthTransportError>;

    /// Revoke the session behind an access token.
    ///
    /// # Errors
    ///
    /// Returns [`AuthTransportError`] if the provider could not be reached;
    /// callers treat sign-out as best effort.
    async fn sign_out(&self, access_token: &str) -> Result<(), AuthTransportError>;

    /// Register a new identity.
    ///
    /// # Errors
    ///
    /// Duplicate emails and weak passwords come back as `Provider` errors
    /// with a 4xx status.
    async fn sign_up(&self, new_user: NewUser) -> Result<Identity, AuthTransportError>;
}

//! HTTP client for the hosted GoTrue-style identity service.
//!
//! Thin request/response mapping only. No retries here: transient-failure
//! policy belongs to the session layer so the tests can exercise it against
//! fakes.

use std::time::Duration;

use reqwest::StatusCode;
use secrecy::ExposeSecret;
use serde::Deserialize;
use serde_json::json;
use url::Url;

use armorfloor_core::Email;

use super::{AuthTransportError, Identity, IdentityProvider, NewUser, ProviderSession};
use crate::config::IdentityConfig;

/// Request timeout for all provider calls.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Client for the hosted identity service's REST API.
#[derive(Debug, Clone)]
pub struct GoTrueClient {
    http: reqwest::Client,
    base_url: Url,
    api_key: String,
}

impl GoTrueClient {
    /// Create a new client from the identity configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured base URL cannot be parsed.
    pub fn new(config: &IdentityConfig) -> Result<Self, url::ParseError> {
        let base_url = Url::parse(&config.url)?;
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();

        Ok(Self {
            http,
            base_url,
            api_key: config.api_key.expose_secret().to_owned(),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, AuthTransportError> {
        self.base_url
            .join(path)
            .map_err(|e| AuthTransportError::Malformed(format!("bad endpoint {path}: {e}")))
    }

    /// Pull a human-readable message out of a provider error body.
    ///
    /// GoTrue error payloads are inconsistent across endpoints (`msg`,
    /// `message`, `error_description`), so all three are tried.
    async fn provider_error(response: reqwest::Response) -> AuthTransportError {
        let status = response.status().as_u16();
        let message = match response.json::<WireError>().await {
            Ok(body) => body.into_message(),
            Err(_) => "(no error details provided)".to_owned(),
        };
        AuthTransportError::Provider { status, message }
    }
}

#[async_trait::async_trait]
impl IdentityProvider for GoTrueClient {
    async fn get_user(&self, access_token: &str) -> Result<Option<Identity>, AuthTransportError> {
        let url = self.endpoint("auth/v1/user")?;
        let response = self
            .http
            .get(url)
            .header("apikey", &self.api_key)
            .bearer_auth(access_token)
            .send()
            .await?;

        // An expired or revoked token is the normal anonymous case.
        if response.status() == StatusCode::UNAUTHORIZED {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(Self::provider_error(response).await);
        }

        let user: WireUser = response
            .json()
            .await
            .map_err(|e| AuthTransportError::Malformed(e.to_string()))?;
        user.into_identity().map(Some)
    }

    async fn sign_in_with_password(
        &self,
        email: &Email,
        password: &str,
    ) -> Result<ProviderSession, AuthTransportError> {
        let mut url = self.endpoint("auth/v1/token")?;
        url.set_query(Some("grant_type=password"));

        let response = self
            .http
            .post(url)
            .header("apikey", &self.api_key)
            .json(&json!({ "email": email.as_str(), "password": password }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::provider_error(response).await);
        }

        let session: WireSession = response
            .json()
            .await
            .map_err(|e| AuthTransportError::Malformed(e.to_string()))?;
        session.into_session()
    }

    async fn refresh_session(
        &self,
        refresh_token: &str,
    ) -> Result<ProviderSession, AuthTransportError> {
        let mut url = self.endpoint("auth/v1/token")?;
        url.set_query(Some("grant_type=refresh_token"));

        let response = self
            .http
            .post(url)
            .header("apikey", &self.api_key)
            .json(&json!({ "refresh_token": refresh_token }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::provider_error(response).await);
        }

        let session: WireSession = response
            .json()
            .await
            .map_err(|e| AuthTransportError::Malformed(e.to_string()))?;
        session.into_session()
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), AuthTransportError> {
        let url = self.endpoint("auth/v1/logout")?;
        let response = self
            .http
            .post(url)
            .header("apikey", &self.api_key)
            .bearer_auth(access_token)
            .send()
            .await?;

        // 401 on logout means the session is already gone, which is fine.
        if !response.status().is_success() && response.status() != StatusCode::UNAUTHORIZED {
            return Err(Self::provider_error(response).await);
        }

        Ok(())
    }

    async fn sign_up(&self, new_user: NewUser) -> Result<Identity, AuthTransportError> {
        let url = self.endpoint("auth/v1/signup")?;
        let response = self
            .http
            .post(url)
            .header("apikey", &self.api_key)
            .json(&json!({
                "email": new_user.email.as_str(),
                "password": new_user.password,
                "data": {
                    "first_name": new_user.first_name,
                    "last_name": new_user.last_name,
                    "phone": new_user.phone,
                    "role": new_user.role,
                },
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::provider_error(response).await);
        }

        let user: WireUser = response
            .json()
            .await
            .map_err(|e| AuthTransportError::Malformed(e.to_string()))?;
        user.into_identity()
    }
}

// =============================================================================
// Wire Types
// =============================================================================

/// User payload as returned by the provider.
#[derive(Debug, Deserialize)]
struct WireUser {
    id: String,
    email: String,
}

impl WireUser {
    fn into_identity(self) -> Result<Identity, AuthTransportError> {
        let id = self
            .id
            .parse()
            .map_err(|_| AuthTransportError::Malformed(format!("invalid subject id: {}", self.id)))?;
        let email = Email::parse(&self.email)
            .map_err(|e| AuthTransportError::Malformed(format!("invalid email: {e}")))?;
        Ok(Identity { id, email })
    }
}

/// Token-grant payload as returned by the provider.
#[derive(Debug, Deserialize)]
struct WireSession {
    access_token: String,
    refresh_token: String,
    expires_in: u64,
    user: WireUser,
}

impl WireSession {
    fn into_session(self) -> Result<ProviderSession, AuthTransportError> {
        Ok(ProviderSession {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_in: self.expires_in,
            user: self.user.into_identity()?,
        })
    }
}

/// Error body shapes the provider emits, depending on endpoint.
#[derive(Debug, Deserialize)]
struct WireError {
    msg: Option<String>,
    message: Option<String>,
    error_description: Option<String>,
}

impl WireError {
    fn into_message(self) -> String {
        self.msg
            .or(self.message)
            .or(self.error_description)
            .unwrap_or_else(|| "(no error details provided)".to_owned())
    }
}

//! Authentication route handlers.
//!
//! Passthroughs to the identity provider: password sign-in, sign-out,
//! registration, and the session snapshot. Sign-in is where the provider
//! token pair becomes the cookie pair; everything downstream reads cookies.

use axum::{Json, extract::State, http::StatusCode};
use axum_extra::extract::cookie::CookieJar;
use serde::{Deserialize, Serialize};

use armorfloor_core::{Email, Role};

use crate::error::AppError;
use crate::middleware::{clear_session_cookies, session_cookies, session_tokens};
use crate::session::{SessionState, SessionTokens, ValidationContext};
use crate::state::AppState;

// =============================================================================
// Request/Response Types
// =============================================================================

/// Login form data.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Successful login response.
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    /// Normalized role, if the directory has one for this account.
    pub role: Option<Role>,
    /// Where this role's landing page is.
    pub redirect: &'static str,
}

/// Registration form data. Registrations always enter as customers; staff
/// and sales accounts are provisioned from the back office.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
}

/// Successful registration response.
#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub id: armorfloor_core::UserId,
    pub email: Email,
}

/// Logout response.
#[derive(Debug, Serialize)]
pub struct LogoutResponse {
    pub ok: bool,
}

/// Landing page for a freshly signed-in role.
const fn landing_path(role: Option<Role>) -> &'static str {
    match role {
        Some(Role::Admin) => "/admin",
        Some(Role::Staff | Role::Sales) => "/sales-dashboard",
        Some(Role::Customer) => "/customer-portal",
        None => "/",
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// Handle a password login.
///
/// All three login pages post here; the landing path in the response is
/// chosen by the resolved role, not by which page was used.
///
/// # Errors
///
/// `401` for rejected credentials, `502` when the provider is unreachable.
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(form): Json<LoginRequest>,
) -> Result<(CookieJar, Json<LoginResponse>), AppError> {
    let email =
        Email::parse(&form.email).map_err(|e| AppError::BadRequest(format!("invalid email: {e}")))?;

    let session = state
        .identity()
        .sign_in_with_password(&email, &form.password)
        .await
        .map_err(|err| {
            if err.is_rejection() {
                AppError::Unauthorized("Invalid email or password".to_string())
            } else {
                AppError::Identity(err)
            }
        })?;

    // Run the fresh tokens through the session machinery so the role the
    // client is told matches what the guard will decide on the next request.
    let tokens = SessionTokens {
        access: Some(session.access_token.clone()),
        refresh: Some(session.refresh_token.clone()),
    };
    let snapshot = state
        .sessions()
        .validate(ValidationContext::Server, &tokens)
        .await?;

    tracing::info!(role = snapshot.role.map(Role::as_str), "user signed in");

    let (access, refresh) = session_cookies(&session, state.config().is_secure());
    let response = LoginResponse {
        role: snapshot.role,
        redirect: landing_path(snapshot.role),
    };

    Ok((jar.add(access).add(refresh), Json(response)))
}

/// Handle logout.
///
/// Provider revocation is best effort: the cookies are cleared no matter
/// what, so a provider outage cannot keep a browser signed in.
pub async fn logout(
    State(state): State<AppState>,
    jar: CookieJar,
) -> (CookieJar, Json<LogoutResponse>) {
    let tokens = session_tokens(&jar);

    if let Some(access) = tokens.access.as_deref()
        && let Err(err) = state.identity().sign_out(access).await
    {
        tracing::warn!(error = %err, "provider sign-out failed; clearing cookies anyway");
    }

    let (access, refresh) = clear_session_cookies();
    (jar.add(access).add(refresh), Json(LogoutResponse { ok: true }))
}

/// Handle customer registration.
///
/// The directory row is provisioned asynchronously from the provider's user
/// metadata, so a just-registered account validates with `role: null` until
/// that lands.
///
/// # Errors
///
/// `400` for duplicate emails or weak passwords, `502` on provider outage.
pub async fn register(
    State(state): State<AppState>,
    Json(form): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), AppError> {
    let email =
        Email::parse(&form.email).map_err(|e| AppError::BadRequest(format!("invalid email: {e}")))?;

    let identity = state
        .identity()
        .sign_up(crate::identity::NewUser {
            email,
            password: form.password,
            first_name: form.first_name,
            last_name: form.last_name,
            phone: form.phone,
            role: Role::Customer.as_str().to_string(),
        })
        .await
        .map_err(|err| {
            if err.is_rejection() {
                AppError::BadRequest(err.to_string())
            } else {
                AppError::Identity(err)
            }
        })?;

    tracing::info!(user = %identity.id, "customer registered");

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            id: identity.id,
            email: identity.email,
        }),
    ))
}

/// Return the current session snapshot.
///
/// Public on purpose: the browser shell bootstraps from it, and a degraded
/// state must surface here as data rather than as a failed request.
///
/// # Errors
///
/// Only fails when graceful degradation is disabled and the provider is
/// down.
pub async fn session_snapshot(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<Json<SessionState>, AppError> {
    let tokens = session_tokens(&jar);
    let snapshot = state
        .sessions()
        .validate(ValidationContext::Server, &tokens)
        .await?;

    Ok(Json(snapshot))
}

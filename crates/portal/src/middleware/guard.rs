//! Route guard: path-prefix role gating for every inbound request.
//!
//! The guard computes a fresh [`SessionState`] per request and checks it
//! against a static prefix table. Outcomes are deliberate and closed:
//! unauthenticated and wrong-role are observably different, protected paths
//! fail closed on internal errors, and public paths fail open so a broken
//! auth subsystem cannot take down the marketing site.
//!
//! Every response that passes through picks up advisory
//! `X-Session-Status`/`X-Session-Error` headers. Downstream handlers must
//! not treat them as an authorization decision - extractors re-check.

use axum::{
    Json,
    extract::{Request, State},
    http::{HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;
use serde_json::json;

use armorfloor_core::Role;

use crate::session::{SessionState, ValidationContext};
use crate::state::AppState;

use super::cookies::session_tokens;

/// Advisory header: `authenticated` or `anonymous`.
pub const SESSION_STATUS_HEADER: &str = "x-session-status";

/// Advisory header carrying the degradation error, when there is one.
pub const SESSION_ERROR_HEADER: &str = "x-session-error";

/// Where wrong-role page requests land.
const UNAUTHORIZED_PATH: &str = "/unauthorized";

/// How a prefix rejects: pages redirect, API routes answer JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteKind {
    Page,
    Api,
}

/// One entry of the static path-to-role table.
#[derive(Debug)]
pub struct GuardRule {
    /// Path prefix this rule covers (segment-aligned).
    pub prefix: &'static str,
    /// Roles allowed through.
    pub allowed: &'static [Role],
    /// Login page for this area (pages only).
    pub login: &'static str,
    /// Machine-readable role label for rejections.
    pub required: &'static str,
    /// Rejection style.
    pub kind: RouteKind,
}

/// The protected areas. API prefixes first; page prefixes follow with
/// `/admin-new` ahead of `/admin` so first match wins cleanly.
pub const GUARD_RULES: &[GuardRule] = &[
    GuardRule {
        prefix: "/api/admin",
        allowed: &[Role::Admin],
        login: "/auth/login",
        required: "admin",
        kind: RouteKind::Api,
    },
    GuardRule {
        prefix: "/api/sales",
        allowed: &[Role::Admin, Role::Staff, Role::Sales],
        login: "/auth/sales-login",
        required: "sales",
        kind: RouteKind::Api,
    },
    GuardRule {
        prefix: "/api/customer",
        allowed: &[Role::Customer],
        login: "/auth/customer-login",
        required: "customer",
        kind: RouteKind::Api,
    },
    GuardRule {
        prefix: "/admin-new",
        allowed: &[Role::Admin],
        login: "/auth/login",
        required: "admin",
        kind: RouteKind::Page,
    },
    GuardRule {
        prefix: "/admin",
        allowed: &[Role::Admin],
        login: "/auth/login",
        required: "admin",
        kind: RouteKind::Page,
    },
    GuardRule {
        prefix: "/sales-dashboard",
        allowed: &[Role::Admin, Role::Staff, Role::Sales],
        login: "/auth/sales-login",
        required: "sales",
        kind: RouteKind::Page,
    },
    GuardRule {
        prefix: "/customer-portal",
        allowed: &[Role::Customer],
        login: "/auth/customer-login",
        required: "customer",
        kind: RouteKind::Page,
    },
];

/// Find the rule covering a path, if any.
///
/// Prefixes are segment-aligned: `/admin-new` does not match the `/admin`
/// rule, and `/administrivia` matches nothing.
#[must_use]
pub fn rule_for_path(path: &str) -> Option<&'static GuardRule> {
    GUARD_RULES.iter().find(|rule| {
        path.strip_prefix(rule.prefix)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
    })
}

/// The four outcomes a guarded request can have.
#[derive(Debug)]
pub enum GuardOutcome {
    /// Pass through (allowed, or the path is unprotected).
    Allow,
    /// No session where one is required.
    Unauthenticated {
        /// True when the state carries a degradation error, i.e. the
        /// session likely expired out from under the user.
        expired: bool,
    },
    /// Authenticated, but the role is outside the allowed set.
    Forbidden { required: &'static str },
}

/// Decide the outcome for a session against an (optional) rule.
///
/// A `None` role on an authenticated session is a deny: set-membership can
/// never succeed for it, and an unknown role must not be an implicit allow.
#[must_use]
pub fn evaluate(rule: Option<&GuardRule>, session: &SessionState) -> GuardOutcome {
    let Some(rule) = rule else {
        return GuardOutcome::Allow;
    };

    if !session.is_authenticated {
        return GuardOutcome::Unauthenticated {
            expired: session.error.is_some(),
        };
    }

    let allowed = session.role.is_some_and(|role| rule.allowed.contains(&role));
    if allowed {
        GuardOutcome::Allow
    } else {
        GuardOutcome::Forbidden {
            required: rule.required,
        }
    }
}

/// Build the login redirect target for an unauthenticated page request.
#[must_use]
pub fn login_redirect_target(rule: &GuardRule, original_path: &str, expired: bool) -> String {
    let mut target = format!(
        "{}?redirect={}",
        rule.login,
        urlencoding::encode(original_path)
    );
    if expired {
        target.push_str("&error=session_expired");
    }
    target
}

/// Build the wrong-role redirect target for a page request.
#[must_use]
pub fn unauthorized_redirect_target(required: &str) -> String {
    format!("{UNAUTHORIZED_PATH}?required_role={required}")
}

/// The guard middleware.
///
/// Applied to the whole router; unprotected paths only pick up the advisory
/// headers.
pub async fn route_guard(
    State(state): State<AppState>,
    jar: CookieJar,
    request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_owned();
    let rule = rule_for_path(&path);
    let tokens = session_tokens(&jar);

    let session = match state
        .sessions()
        .validate(ValidationContext::Server, &tokens)
        .await
    {
        Ok(session) => session,
        Err(err) => {
            // Degradation is disabled and the provider is down. Protected
            // paths fail closed; public paths fail open without headers.
            tracing::error!(path = %path, error = %err, "session validation failed in route guard");
            sentry::capture_error(&err);

            return match rule {
                Some(rule) => system_error_response(rule),
                None => next.run(request).await,
            };
        }
    };

    let Some(rule) = rule else {
        let mut response = next.run(request).await;
        attach_session_headers(&mut response, &session);
        return response;
    };

    match evaluate(Some(rule), &session) {
        GuardOutcome::Allow => {
            let mut response = next.run(request).await;
            attach_session_headers(&mut response, &session);
            response
        }
        GuardOutcome::Unauthenticated { expired } => {
            tracing::info!(path = %path, expired, "route guard: unauthenticated request denied");
            unauthenticated_response(rule, &path, expired)
        }
        GuardOutcome::Forbidden { required } => {
            tracing::info!(
                path = %path,
                role = session.role.map(Role::as_str),
                required,
                "route guard: role denied"
            );
            forbidden_response(rule, required)
        }
    }
}

fn unauthenticated_response(rule: &GuardRule, path: &str, expired: bool) -> Response {
    match rule.kind {
        RouteKind::Api => (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "Unauthorized" })),
        )
            .into_response(),
        RouteKind::Page => {
            Redirect::temporary(&login_redirect_target(rule, path, expired)).into_response()
        }
    }
}

fn forbidden_response(rule: &GuardRule, required: &str) -> Response {
    match rule.kind {
        RouteKind::Api => (
            StatusCode::FORBIDDEN,
            Json(json!({ "error": "Forbidden", "required_role": required })),
        )
            .into_response(),
        RouteKind::Page => {
            Redirect::temporary(&unauthorized_redirect_target(required)).into_response()
        }
    }
}

fn system_error_response(rule: &GuardRule) -> Response {
    match rule.kind {
        RouteKind::Api => {
            let mut response = (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "error": "Unauthorized" })),
            )
                .into_response();
            response.headers_mut().insert(
                SESSION_ERROR_HEADER,
                HeaderValue::from_static("system_error"),
            );
            response
        }
        RouteKind::Page => {
            Redirect::temporary(&format!("{}?error=system_error", rule.login)).into_response()
        }
    }
}

/// Attach the advisory session headers to a pass-through response.
fn attach_session_headers(response: &mut Response, session: &SessionState) {
    let status = if session.is_authenticated {
        "authenticated"
    } else {
        "anonymous"
    };
    response
        .headers_mut()
        .insert(SESSION_STATUS_HEADER, HeaderValue::from_static(status));

    if let Some(error) = session.error.as_deref()
        && let Ok(value) = HeaderValue::from_str(error)
    {
        response.headers_mut().insert(SESSION_ERROR_HEADER, value);
    }
}

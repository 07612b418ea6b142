//! HTTP middleware stack for the portal.
//!
//! # Middleware Order (bottom to top in Router)
//!
//! 1. Sentry layer (capture errors)
//! 2. `TraceLayer` (request tracing)
//! 3. Request ID (add unique ID to each request)
//! 4. Route guard (session validation + path-prefix role gating)
//! 5. Security headers

pub mod cookies;
pub mod guard;
pub mod request_id;
pub mod security_headers;

pub use cookies::{
    ACCESS_COOKIE, REFRESH_COOKIE, clear_session_cookies, session_cookies, session_tokens,
};
pub use guard::{
    GUARD_RULES, GuardOutcome, GuardRule, RouteKind, SESSION_ERROR_HEADER, SESSION_STATUS_HEADER,
    evaluate, route_guard, rule_for_path,
};
pub use request_id::request_id_middleware;
pub use security_headers::security_headers_middleware;

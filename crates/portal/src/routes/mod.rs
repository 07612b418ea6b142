//! Route handlers for the portal.
//!
//! The interesting work happens in the middleware and the session layer;
//! handlers here are thin: auth passthroughs to the identity provider, the
//! session snapshot endpoint, and the guarded area placeholders.

pub mod areas;
pub mod auth;

use axum::{
    Router,
    routing::{get, post},
};

use crate::state::AppState;

/// Assemble the portal's routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        // Public marketing surface
        .route("/", get(areas::home))
        .route("/services", get(areas::services))
        .route("/unauthorized", get(areas::unauthorized))
        // Auth passthroughs (one handler; three pages post to it)
        .route("/auth/login", post(auth::login))
        .route("/auth/sales-login", post(auth::login))
        .route("/auth/customer-login", post(auth::login))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/register", post(auth::register))
        // Session snapshot (public; degraded states surface here)
        .route("/api/session", get(auth::session_snapshot))
        // Guarded pages
        .route("/admin", get(areas::admin_home))
        .route("/admin-new", get(areas::admin_home))
        .route("/admin-new/equipment", get(areas::admin_equipment))
        .route("/sales-dashboard", get(areas::sales_home))
        .route("/customer-portal", get(areas::customer_home))
        // Guarded APIs
        .route("/api/admin/summary", get(areas::admin_summary))
        .route("/api/sales/pipeline", get(areas::sales_pipeline))
        .route("/api/customer/projects", get(areas::customer_projects))
}

//! Public pages and guarded area placeholders.
//!
//! The front end renders these client-side; the server answers JSON. Access
//! control happens entirely in the route guard before any handler here runs,
//! so handlers stay oblivious to roles.

use axum::Json;
use serde_json::{Value, json};

/// Marketing landing page data.
pub async fn home() -> Json<Value> {
    Json(json!({
        "company": "Armorfloor Systems",
        "tagline": "Epoxy floors built for shops that work",
        "cta": "/services",
    }))
}

/// Service catalog for the marketing site.
pub async fn services() -> Json<Value> {
    Json(json!({
        "services": [
            { "slug": "garage-epoxy", "name": "Garage Epoxy Coating" },
            { "slug": "commercial-flake", "name": "Commercial Flake Systems" },
            { "slug": "industrial-urethane", "name": "Industrial Urethane Cement" },
            { "slug": "concrete-polishing", "name": "Concrete Polishing" },
        ],
    }))
}

/// Landing page for wrong-role redirects.
pub async fn unauthorized() -> Json<Value> {
    Json(json!({
        "error": "You do not have access to that area",
    }))
}

/// Admin dashboard shell.
pub async fn admin_home() -> Json<Value> {
    Json(json!({ "area": "admin" }))
}

/// Equipment management screen shell.
pub async fn admin_equipment() -> Json<Value> {
    Json(json!({ "area": "admin", "screen": "equipment" }))
}

/// Sales dashboard shell.
pub async fn sales_home() -> Json<Value> {
    Json(json!({ "area": "sales-dashboard" }))
}

/// Customer portal shell.
pub async fn customer_home() -> Json<Value> {
    Json(json!({ "area": "customer-portal" }))
}

/// Back-office summary numbers.
pub async fn admin_summary() -> Json<Value> {
    Json(json!({ "open_leads": 0, "quotes_pending": 0, "jobs_scheduled": 0 }))
}

/// Sales pipeline snapshot.
pub async fn sales_pipeline() -> Json<Value> {
    Json(json!({ "stages": ["new", "quoted", "scheduled", "complete"] }))
}

/// The signed-in customer's projects.
pub async fn customer_projects() -> Json<Value> {
    Json(json!({ "projects": [] }))
}

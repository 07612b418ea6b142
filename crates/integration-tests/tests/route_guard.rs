//! Route guard behavior over the assembled router.
//!
//! Each test drives one request through `oneshot` and asserts on the
//! observable outcome: status, redirect target, headers, body shape.

#![allow(clippy::unwrap_used)]

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use serde_json::Value;
use tower::ServiceExt;

use armorfloor_integration_tests::{StubDirectory, StubIdentity, TEST_COOKIES, app_with};

fn get(uri: &str, cookies: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(cookies) = cookies {
        builder = builder.header(header::COOKIE, cookies);
    }
    builder.body(Body::empty()).unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn anonymous_request_to_protected_page_redirects_to_login_with_original_path() {
    let app = app_with(StubIdentity::anonymous(), StubDirectory::empty());

    let response = app
        .oneshot(get("/admin-new/equipment", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(
        response.headers().get(header::LOCATION).unwrap(),
        "/auth/login?redirect=%2Fadmin-new%2Fequipment"
    );
}

#[tokio::test]
async fn customer_role_on_sales_dashboard_lands_on_unauthorized() {
    // Directory role is stored as "Customer"; normalization must not let the
    // casing hide the mismatch.
    let app = app_with(
        StubIdentity::authenticated(),
        StubDirectory::with_role("Customer"),
    );

    let response = app
        .oneshot(get("/sales-dashboard", Some(TEST_COOKIES)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(
        response.headers().get(header::LOCATION).unwrap(),
        "/unauthorized?required_role=sales"
    );
}

#[tokio::test]
async fn provider_outage_does_not_block_public_pages() {
    let app = app_with(StubIdentity::failing(), StubDirectory::empty());

    let response = app.oneshot(get("/", Some(TEST_COOKIES))).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("x-session-status").unwrap(),
        "anonymous"
    );
    assert!(response.headers().get("x-session-error").is_some());
}

#[tokio::test]
async fn anonymous_api_request_gets_401_json() {
    let app = app_with(StubIdentity::anonymous(), StubDirectory::empty());

    let response = app.oneshot(get("/api/admin/summary", None)).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["error"], "Unauthorized");
}

#[tokio::test]
async fn wrong_role_api_request_differs_from_unauthenticated() {
    let app = app_with(
        StubIdentity::authenticated(),
        StubDirectory::with_role("customer"),
    );

    let response = app
        .oneshot(get("/api/admin/summary", Some(TEST_COOKIES)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = body_json(response).await;
    assert_eq!(body["error"], "Forbidden");
    assert_eq!(body["required_role"], "admin");
}

#[tokio::test]
async fn matching_role_passes_with_authenticated_header() {
    let app = app_with(
        StubIdentity::authenticated(),
        StubDirectory::with_role("super_admin"),
    );

    let response = app.oneshot(get("/admin", Some(TEST_COOKIES))).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("x-session-status").unwrap(),
        "authenticated"
    );
    assert!(response.headers().get("x-session-error").is_none());
}

#[tokio::test]
async fn sales_dashboard_admits_staff_synonyms() {
    for raw in ["staff", "Sales_Rep", "salesperson", "ADMIN"] {
        let app = app_with(
            StubIdentity::authenticated(),
            StubDirectory::with_role(raw),
        );

        let response = app
            .oneshot(get("/sales-dashboard", Some(TEST_COOKIES)))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK, "role {raw} should pass");
    }
}

#[tokio::test]
async fn authenticated_without_directory_row_is_denied_not_errored() {
    let app = app_with(StubIdentity::authenticated(), StubDirectory::empty());

    let response = app
        .oneshot(get("/customer-portal", Some(TEST_COOKIES)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(
        response.headers().get(header::LOCATION).unwrap(),
        "/unauthorized?required_role=customer"
    );
}

#[tokio::test]
async fn degraded_session_redirect_carries_session_expired_marker() {
    // Provider down + graceful degradation: the guard sees an
    // unauthenticated state carrying an error and flags the redirect.
    let app = app_with(StubIdentity::failing(), StubDirectory::empty());

    let response = app
        .oneshot(get("/customer-portal/projects", Some(TEST_COOKIES)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    let location = response
        .headers()
        .get(header::LOCATION)
        .unwrap()
        .to_str()
        .unwrap();
    assert!(location.starts_with("/auth/customer-login?redirect="));
    assert!(location.ends_with("&error=session_expired"));
}

#[tokio::test]
async fn unprotected_paths_never_redirect() {
    let app = app_with(StubIdentity::anonymous(), StubDirectory::empty());

    for uri in ["/", "/services", "/health", "/api/session"] {
        let response = app.clone().oneshot(get(uri, None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK, "{uri} should be open");
    }
}

#[tokio::test]
async fn security_headers_are_set_on_every_response() {
    let app = app_with(StubIdentity::anonymous(), StubDirectory::empty());

    let response = app.oneshot(get("/", None)).await.unwrap();

    assert_eq!(response.headers().get("x-frame-options").unwrap(), "DENY");
    assert_eq!(
        response.headers().get("x-content-type-options").unwrap(),
        "nosniff"
    );
    assert_eq!(
        response.headers().get("referrer-policy").unwrap(),
        "strict-origin-when-cross-origin"
    );
}

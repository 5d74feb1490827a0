//! Account API tests.
//!
//! The `/api` routes are only mounted when `LEDGER_API_TOKEN` is configured
//! and every request must present it as a bearer token.

#![allow(clippy::unwrap_used)]

use axum::body::Body;
use axum::http::{Request, StatusCode};
use droxion_integration_tests::{TestApp, checkout_completed};
use serde_json::json;

async fn funded(email: &str, plan: &str) -> TestApp {
    let app = TestApp::with_api_token();
    let response = app
        .deliver(&checkout_completed("evt_fund", email, Some(plan)))
        .await;
    assert_eq!(response.status, StatusCode::OK);
    app
}

// =============================================================================
// Authentication
// =============================================================================

#[tokio::test]
async fn test_api_not_mounted_without_token() {
    let app = TestApp::new();

    let response = app.get_account("a@x.com").await;

    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_missing_token_rejected() {
    let app = funded("a@x.com", "pro").await;

    let response = app.get("/api/accounts/a@x.com").await;

    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_wrong_token_rejected() {
    let app = funded("a@x.com", "pro").await;

    let response = app
        .send(
            Request::get("/api/accounts/a@x.com")
                .header("authorization", "Bearer not-the-token")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}

// =============================================================================
// Reads
// =============================================================================

#[tokio::test]
async fn test_get_account() {
    let app = funded("a@x.com", "starter").await;

    let response = app.get_account("A@X.com").await;

    assert_eq!(response.status, StatusCode::OK);
    let body = response.json();
    assert_eq!(body["email"], "a@x.com");
    assert_eq!(body["plan"], "starter");
    assert_eq!(body["coinBalance"], 50);
    assert!(body["createdAt"].is_string());
    assert!(body["updatedAt"].is_string());
}

#[tokio::test]
async fn test_get_unknown_account() {
    let app = TestApp::with_api_token();

    let response = app.get_account("nobody@x.com").await;

    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_get_invalid_email() {
    let app = TestApp::with_api_token();

    let response = app.get_account("not-an-email").await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

// =============================================================================
// Spending
// =============================================================================

#[tokio::test]
async fn test_spend_debits_balance() {
    let app = funded("a@x.com", "pro").await;

    let response = app.spend("a@x.com", &json!({ "amount": 40 })).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json()["coinBalance"], 110);
    assert_eq!(response.json()["plan"], "pro");
}

#[tokio::test]
async fn test_spend_more_than_balance_conflicts() {
    let app = funded("a@x.com", "starter").await;

    let response = app.spend("a@x.com", &json!({ "amount": 51 })).await;
    assert_eq!(response.status, StatusCode::CONFLICT);

    let account = app.get_account("a@x.com").await;
    assert_eq!(account.json()["coinBalance"], 50);
}

#[tokio::test]
async fn test_spend_exact_balance() {
    let app = funded("a@x.com", "starter").await;

    let response = app.spend("a@x.com", &json!({ "amount": 50 })).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json()["coinBalance"], 0);
}

#[tokio::test]
async fn test_spend_unknown_account() {
    let app = TestApp::with_api_token();

    let response = app.spend("ghost@x.com", &json!({ "amount": 1 })).await;

    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_spend_invalid_amounts() {
    let app = funded("a@x.com", "pro").await;

    for body in [
        json!({ "amount": 0 }),
        json!({ "amount": -5 }),
        json!({ "amount": "ten" }),
        json!({}),
    ] {
        let response = app.spend("a@x.com", &body).await;
        assert_eq!(response.status, StatusCode::BAD_REQUEST, "body: {body}");
    }

    let account = app.get_account("a@x.com").await;
    assert_eq!(account.json()["coinBalance"], 150);
}

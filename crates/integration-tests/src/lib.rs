//! Integration tests for the Droxion ledger.
//!
//! # Running Tests
//!
//! ```bash
//! # In-process router tests (no external services)
//! cargo test -p droxion-integration-tests
//!
//! # PostgreSQL ledger tests
//! TEST_DATABASE_URL=postgres://localhost/droxion_ledger_test \
//!     cargo test -p droxion-integration-tests -- --ignored
//! ```
//!
//! # Test Categories
//!
//! - `webhook_flow` - Webhook endpoint driven through the full router
//! - `account_api` - Bearer-token account API
//! - `postgres_ledger` - `PostgreSQL` store against a real database

#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

use std::time::{SystemTime, UNIX_EPOCH};

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use secrecy::SecretString;
use serde_json::{Value, json};
use tower::ServiceExt;

use droxion_ledger::config::LedgerConfig;
use droxion_ledger::routes;
use droxion_ledger::state::AppState;
use droxion_ledger::store::Ledger;
use droxion_ledger::webhook::{DEFAULT_TOLERANCE, SIGNATURE_HEADER, SignatureVerifier};

/// Webhook secret shared by the test app and the test signer.
pub const WEBHOOK_SECRET: &str = "whsec_T7pQ2mVx9KdL4rNc8ZbW3yHs";

/// API token configured on apps built with [`TestApp::with_api_token`].
pub const API_TOKEN: &str = "tok_4Hq9Zx2LmR7vP3nK8sW1cY6tB5dF0gJe";

/// A response collected into memory.
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub request_id: Option<String>,
    pub body: String,
}

impl TestResponse {
    /// Parse the body as JSON.
    #[must_use]
    pub fn json(&self) -> Value {
        serde_json::from_str(&self.body).unwrap()
    }
}

/// In-process ledger service.
pub struct TestApp {
    pub state: AppState,
    router: Router,
    signer: SignatureVerifier,
}

impl TestApp {
    /// App backed by a fresh in-memory ledger, account API disabled.
    #[must_use]
    pub fn new() -> Self {
        Self::build(LedgerConfig::in_memory(SecretString::from(WEBHOOK_SECRET)), Ledger::memory())
    }

    /// App backed by a fresh in-memory ledger with the account API enabled.
    #[must_use]
    pub fn with_api_token() -> Self {
        let mut config = LedgerConfig::in_memory(SecretString::from(WEBHOOK_SECRET));
        config.api_token = Some(SecretString::from(API_TOKEN));
        Self::build(config, Ledger::memory())
    }

    /// App over an arbitrary ledger backend.
    #[must_use]
    pub fn build(config: LedgerConfig, ledger: Ledger) -> Self {
        let state = AppState::new(config, ledger).unwrap();
        Self {
            router: routes::app(state.clone()),
            state,
            signer: SignatureVerifier::new(SecretString::from(WEBHOOK_SECRET), DEFAULT_TOLERANCE),
        }
    }

    /// Signature header for `payload` at the current time.
    #[must_use]
    pub fn sign(&self, payload: &[u8]) -> String {
        self.signer.sign(payload, unix_now())
    }

    /// Send a request through the router.
    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let request_id = response
            .headers()
            .get("x-request-id")
            .and_then(|v| v.to_str().ok())
            .map(String::from);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        TestResponse {
            status,
            request_id,
            body: String::from_utf8(bytes.to_vec()).unwrap(),
        }
    }

    /// POST a correctly signed webhook.
    pub async fn deliver(&self, payload: &[u8]) -> TestResponse {
        let signature = self.sign(payload);
        self.deliver_with_signature(payload, Some(&signature)).await
    }

    /// POST a webhook with the given signature header (or none).
    pub async fn deliver_with_signature(
        &self,
        payload: &[u8],
        signature: Option<&str>,
    ) -> TestResponse {
        let mut builder = Request::post("/webhook").header("content-type", "application/json");
        if let Some(signature) = signature {
            builder = builder.header(SIGNATURE_HEADER, signature);
        }
        self.send(builder.body(Body::from(payload.to_vec())).unwrap())
            .await
    }

    /// GET a path without credentials.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.send(Request::get(path).body(Body::empty()).unwrap())
            .await
    }

    /// GET an account through the API.
    pub async fn get_account(&self, email: &str) -> TestResponse {
        self.send(
            Request::get(format!("/api/accounts/{email}"))
                .header("authorization", format!("Bearer {API_TOKEN}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    /// Spend coins through the API.
    pub async fn spend(&self, email: &str, body: &Value) -> TestResponse {
        self.send(
            Request::post(format!("/api/accounts/{email}/spend"))
                .header("authorization", format!("Bearer {API_TOKEN}"))
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }
}

impl Default for TestApp {
    fn default() -> Self {
        Self::new()
    }
}

/// A `checkout.session.completed` payload.
#[must_use]
pub fn checkout_completed(event_id: &str, email: &str, plan: Option<&str>) -> Vec<u8> {
    let metadata = plan.map_or_else(|| json!({}), |p| json!({ "plan": p }));
    json!({
        "id": event_id,
        "object": "event",
        "type": "checkout.session.completed",
        "data": {
            "object": {
                "id": format!("cs_test_{event_id}"),
                "object": "checkout.session",
                "customer_email": email,
                "metadata": metadata,
                "payment_status": "paid"
            }
        }
    })
    .to_string()
    .into_bytes()
}

/// Current unix time in seconds.
#[must_use]
pub fn unix_now() -> i64 {
    i64::try_from(
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs(),
    )
    .unwrap()
}

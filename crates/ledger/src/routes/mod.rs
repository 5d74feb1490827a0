//! HTTP route handlers for the ledger service.
//!
//! # Route Structure
//!
//! ```text
//! GET  /                              - Banner
//! GET  /health                        - Liveness check
//! GET  /health/ready                  - Readiness check (store reachable)
//! POST /webhook                       - Payment provider webhook
//!
//! # Account API (bearer token, only mounted when LEDGER_API_TOKEN is set)
//! GET  /api/accounts/{email}          - Account balance and plan
//! POST /api/accounts/{email}/spend    - Debit coins
//! ```

pub mod accounts;
pub mod health;
pub mod webhook;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};
use tower_http::trace::{DefaultOnResponse, OnResponse, TraceLayer};
use tracing::Span;

use crate::middleware::{request_id_middleware, require_api_token};
use crate::state::AppState;

/// Create the account API router.
pub fn account_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/accounts/{email}", get(accounts::show))
        .route("/accounts/{email}/spend", post(accounts::spend))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            require_api_token,
        ))
}

/// Build the complete application router with tracing and request ids.
///
/// Sentry layers are added by the binary so tests can drive this router
/// without a Sentry client.
pub fn app(state: AppState) -> Router {
    let mut router = Router::new()
        .route("/", get(health::index))
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        .route("/webhook", post(webhook::receive));

    if state.config().api_token.is_some() {
        router = router.nest("/api", account_routes(&state));
    } else {
        tracing::info!("LEDGER_API_TOKEN not set, account API disabled");
    }

    router
        .layer(axum_middleware::from_fn(request_id_middleware))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri().path(),
                        request_id = tracing::field::Empty,
                        status = tracing::field::Empty,
                        latency_ms = tracing::field::Empty,
                    )
                })
                .on_response(
                    |response: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &Span| {
                        span.record("status", response.status().as_u16());
                        span.record(
                            "latency_ms",
                            u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
                        );
                        DefaultOnResponse::default().on_response(response, latency, span);
                    },
                ),
        )
        .with_state(state)
}

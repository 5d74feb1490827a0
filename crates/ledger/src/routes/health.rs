//! Banner and health check handlers.

use axum::{extract::State, http::StatusCode};

use crate::store::LedgerStore;
use crate::state::AppState;

/// Plain-text banner so a browser visit shows the service is up.
pub async fn index() -> &'static str {
    "droxion ledger webhook is running"
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
pub async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Returns 503 Service Unavailable if the ledger store is not reachable.
pub async fn readiness(State(state): State<AppState>) -> StatusCode {
    match state.ledger().ping().await {
        Ok(()) => StatusCode::OK,
        Err(err) => {
            tracing::warn!(error = %err, "Readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

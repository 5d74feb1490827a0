//! Payment provider webhook endpoint.
//!
//! The body is taken as raw bytes: the signature covers the exact payload,
//! so it must be verified before any JSON parsing.

use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::HeaderMap,
};
use serde::Serialize;

use crate::error::Result;
use crate::state::AppState;
use crate::webhook::{SIGNATURE_HEADER, process_delivery};

/// Acknowledgement body returned to the provider.
#[derive(Debug, Serialize)]
pub struct Received {
    received: bool,
}

/// Receive a webhook delivery.
///
/// Returns `{"received": true}` for credited, duplicate, and ignored events.
/// Verification and parse failures are 400s; storage failures are 500s so the
/// provider retries.
pub async fn receive(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Received>> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());

    process_delivery(
        state.ledger(),
        state.catalog(),
        state.verifier(),
        &body,
        signature,
    )
    .await?;

    Ok(Json(Received { received: true }))
}

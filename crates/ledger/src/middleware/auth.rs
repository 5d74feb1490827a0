//! Bearer token authentication for the account API.

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::warn;

use crate::config::token_matches;
use crate::error::AppError;
use crate::state::AppState;

/// Middleware that requires `Authorization: Bearer <LEDGER_API_TOKEN>`.
///
/// Rejects every request with 401 when no token is configured; the router
/// does not mount `/api` in that case, so this only matters if it is layered
/// elsewhere.
pub async fn require_api_token(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let presented = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim);

    let authorized = match (state.config().api_token.as_ref(), presented) {
        (Some(expected), Some(presented)) => token_matches(expected, presented),
        _ => false,
    };

    if !authorized {
        warn!(
            security = true,
            path = %request.uri().path(),
            "Rejected account API request without valid token"
        );
        return AppError::Unauthorized.into_response();
    }

    next.run(request).await
}

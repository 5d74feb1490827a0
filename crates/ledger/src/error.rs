//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures server-side errors to
//! Sentry before responding to the client. All route handlers return
//! `Result<T, AppError>`.
//!
//! Client errors are plain-text responses. Webhook verification and parsing
//! failures are 400s; storage failures are 500s so the payment provider
//! retries the delivery.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::store::LedgerError;
use crate::webhook::{EventParseError, SignatureError, WebhookError};

/// Application-level error type for the ledger service.
#[derive(Debug, Error)]
pub enum AppError {
    /// Webhook signature verification failed.
    #[error("Webhook Error: {0}")]
    Verification(#[from] SignatureError),

    /// Webhook payload could not be interpreted.
    #[error("Webhook Error: {0}")]
    Parse(#[from] EventParseError),

    /// Ledger operation failed.
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// Missing or wrong credentials.
    #[error("Unauthorized")]
    Unauthorized,

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl From<WebhookError> for AppError {
    fn from(err: WebhookError) -> Self {
        match err {
            WebhookError::Verification(e) => Self::Verification(e),
            WebhookError::Parse(e) => Self::Parse(e),
            WebhookError::Ledger(e) => Self::Ledger(e),
        }
    }
}

impl AppError {
    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            // The local clock is unreadable; the delivery itself may be fine.
            Self::Verification(SignatureError::Clock(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Verification(_) | Self::Parse(_) | Self::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::Ledger(err) => match err {
                LedgerError::NotFound => StatusCode::NOT_FOUND,
                LedgerError::InsufficientCoins { .. } => StatusCode::CONFLICT,
                LedgerError::BalanceOverflow => StatusCode::UNPROCESSABLE_ENTITY,
                LedgerError::Database(_)
                | LedgerError::Unavailable(_)
                | LedgerError::DataCorruption(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Capture server errors to Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        // Don't expose internal error details to clients
        let message = if status.is_server_error() {
            "Internal server error".to_string()
        } else {
            match &self {
                Self::Ledger(LedgerError::NotFound) => "Account not found".to_string(),
                Self::Ledger(err) => err.to_string(),
                _ => self.to_string(),
            }
        };

        (status, message).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

//! HTTP middleware stack for the ledger service.
//!
//! # Middleware Order (bottom to top in Router)
//!
//! 1. Sentry layer (capture errors)
//! 2. `TraceLayer` (request tracing)
//! 3. Request ID (add unique ID to each request)
//! 4. Bearer token (only on `/api`)

pub mod auth;
pub mod request_id;

pub use auth::require_api_token;
pub use request_id::{REQUEST_ID_HEADER, request_id_middleware};

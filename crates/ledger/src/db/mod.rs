//! `PostgreSQL` connection management.
//!
//! # Database: `droxion_ledger`
//!
//! ## Tables (schema `ledger`)
//!
//! - `account` - Customer plan and coin balance, keyed by normalized email
//! - `processed_event` - Payment events already applied (idempotency set)
//!
//! # Migrations
//!
//! Migrations are stored in `crates/ledger/migrations/` and run via:
//! ```bash
//! cargo run -p droxion-cli -- migrate
//! ```

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(1)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

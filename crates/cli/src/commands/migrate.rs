//! Database migration command.
//!
//! # Usage
//!
//! ```bash
//! droxion-cli migrate
//! ```
//!
//! # Environment Variables
//!
//! - `LEDGER_DATABASE_URL` (or `DATABASE_URL`) - `PostgreSQL` connection string
//!
//! # Migration Files
//!
//! Ledger migrations live in `crates/ledger/migrations/` and are embedded in
//! the binary at compile time.

use droxion_ledger::db;
use thiserror::Error;

/// Errors that can occur while migrating.
#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Run ledger database migrations.
///
/// # Errors
///
/// Returns `MigrationError` if the database is unreachable or a migration fails.
pub async fn run() -> Result<(), MigrationError> {
    let database_url =
        super::database_url().ok_or(MigrationError::MissingEnvVar("LEDGER_DATABASE_URL"))?;

    tracing::info!("Connecting to ledger database...");
    let pool = db::create_pool(&database_url).await?;

    tracing::info!("Running ledger migrations...");
    sqlx::migrate!("../ledger/migrations").run(&pool).await?;

    tracing::info!("Ledger migrations complete!");
    Ok(())
}

//! Account management commands.
//!
//! # Usage
//!
//! ```bash
//! droxion-cli account show user@example.com
//! droxion-cli account grant --event-id manual_1 --email user@example.com --plan starter
//! droxion-cli account spend user@example.com 25
//! ```
//!
//! # Environment Variables
//!
//! - `LEDGER_DATABASE_URL` (or `DATABASE_URL`) - `PostgreSQL` connection string
//! - `LEDGER_DEFAULT_PLAN` - Plan credited when `--plan` is omitted or unknown

use droxion_core::{Coins, Email, PaymentEventId, Plan, PlanCatalog};
use droxion_ledger::db;
use droxion_ledger::store::{Account, LedgerError, LedgerStore, PgLedgerStore};
use droxion_ledger::webhook;
use thiserror::Error;

/// Errors that can occur during account operations.
#[derive(Debug, Error)]
pub enum AccountError {
    /// Required environment variable is missing.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    /// Database connection error.
    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),

    /// Ledger operation failed.
    #[error("{0}")]
    Ledger(#[from] LedgerError),

    /// Invalid argument.
    #[error("Invalid {0}: {1}")]
    InvalidArgument(&'static str, String),

    /// Account does not exist.
    #[error("No account for {0}")]
    NotFound(Email),

    /// Output could not be rendered.
    #[error("Output error: {0}")]
    Output(#[from] serde_json::Error),
}

async fn connect() -> Result<PgLedgerStore, AccountError> {
    let database_url =
        super::database_url().ok_or(AccountError::MissingEnvVar("LEDGER_DATABASE_URL"))?;

    tracing::info!("Connecting to ledger database...");
    let pool = db::create_pool(&database_url).await?;
    Ok(PgLedgerStore::new(pool))
}

fn parse_email(raw: &str) -> Result<Email, AccountError> {
    Email::parse(raw).map_err(|e| AccountError::InvalidArgument("email", e.to_string()))
}

fn catalog() -> Result<PlanCatalog, AccountError> {
    let Ok(raw) = std::env::var("LEDGER_DEFAULT_PLAN") else {
        return Ok(PlanCatalog::standard());
    };
    let plan = raw
        .parse::<Plan>()
        .map_err(|e| AccountError::InvalidArgument("LEDGER_DEFAULT_PLAN", e.to_string()))?;
    PlanCatalog::standard()
        .with_default_plan(plan)
        .map_err(|e| AccountError::InvalidArgument("LEDGER_DEFAULT_PLAN", e.to_string()))
}

fn print_account(account: &Account) -> Result<(), AccountError> {
    let rendered = serde_json::to_string_pretty(account)?;
    #[allow(clippy::print_stdout)]
    {
        println!("{rendered}");
    }
    Ok(())
}

/// Print an account.
///
/// # Errors
///
/// Returns `AccountError::NotFound` if the customer has no account.
pub async fn show(email: &str) -> Result<(), AccountError> {
    let email = parse_email(email)?;
    let store = connect().await?;

    let account = store
        .get_account(&email)
        .await?
        .ok_or(AccountError::NotFound(email))?;
    print_account(&account)
}

/// Credit a plan purchase.
///
/// # Errors
///
/// Returns `AccountError` if arguments are invalid or the ledger write fails.
pub async fn grant(event_id: &str, email: &str, plan: Option<&str>) -> Result<(), AccountError> {
    let event_id = PaymentEventId::parse(event_id)
        .map_err(|e| AccountError::InvalidArgument("event id", e.to_string()))?;
    let email = parse_email(email)?;
    let catalog = catalog()?;
    let store = connect().await?;

    let (outcome, grant) = webhook::apply_grant(&store, &catalog, &event_id, &email, plan).await?;

    if outcome.is_duplicate() {
        tracing::warn!("Event {} was already applied; nothing credited", event_id);
    } else {
        tracing::info!(
            "Credited {} coins ({} plan) to {}",
            grant.coins,
            grant.plan,
            email
        );
    }
    print_account(outcome.account())
}

/// Debit coins from an account.
///
/// # Errors
///
/// Returns `AccountError` if the amount is invalid, the account is missing,
/// or the balance is too low.
pub async fn spend(email: &str, amount: i64) -> Result<(), AccountError> {
    let email = parse_email(email)?;
    let amount = Coins::new(amount)
        .ok()
        .filter(|amount| !amount.is_zero())
        .ok_or_else(|| AccountError::InvalidArgument("amount", amount.to_string()))?;
    let store = connect().await?;

    let account = store.spend(&email, amount).await?;
    tracing::info!("Spent {} coins for {}", amount, email);
    print_account(&account)
}

//! Account API handlers.

use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
};
use serde::Deserialize;
use tracing::{info, instrument};

use droxion_core::{Coins, Email};

use crate::error::{AppError, Result};
use crate::state::AppState;
use crate::store::{Account, LedgerError, LedgerStore};

/// Request body for a coin debit.
#[derive(Debug, Deserialize)]
pub struct SpendRequest {
    /// Coins to debit; must be positive.
    pub amount: i64,
}

fn parse_email(raw: &str) -> Result<Email> {
    Email::parse(raw).map_err(|e| AppError::BadRequest(format!("invalid email: {e}")))
}

/// Show an account's plan and balance.
#[instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    Path(email): Path<String>,
) -> Result<Json<Account>> {
    let email = parse_email(&email)?;
    let account = state
        .ledger()
        .get_account(&email)
        .await?
        .ok_or(LedgerError::NotFound)?;
    Ok(Json(account))
}

/// Debit coins from an account.
#[instrument(skip(state, body))]
pub async fn spend(
    State(state): State<AppState>,
    Path(email): Path<String>,
    body: std::result::Result<Json<SpendRequest>, JsonRejection>,
) -> Result<Json<Account>> {
    let email = parse_email(&email)?;
    let Json(request) = body.map_err(|e| AppError::BadRequest(e.body_text()))?;

    let amount = Coins::new(request.amount)
        .ok()
        .filter(|amount| !amount.is_zero())
        .ok_or_else(|| AppError::BadRequest("amount must be a positive integer".to_owned()))?;

    let account = state.ledger().spend(&email, amount).await?;
    info!(
        email = %account.email,
        amount = %amount,
        balance = %account.coin_balance,
        "Coins spent"
    );
    Ok(Json(account))
}

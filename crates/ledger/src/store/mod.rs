//! Coin ledger storage.
//!
//! The ledger maps a customer email to an [`Account`] (plan tier and coin
//! balance) and remembers which payment events have already been applied.
//!
//! # Guarantees
//!
//! - `apply_grant` credits each [`PaymentEventId`] at most once. The
//!   processed-event marker and the balance update are committed together,
//!   so a failed or interrupted write leaves neither behind.
//! - Writes for one customer are serialized; writes for different customers
//!   do not contend.
//! - Balances never go negative.
//!
//! # Backends
//!
//! - [`PgLedgerStore`] - `PostgreSQL`, the production backend
//! - [`MemoryLedgerStore`] - process-local, for development and tests
//!
//! [`Ledger`] selects one at start-up and is what handlers hold.

pub mod memory;
pub mod postgres;

use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use droxion_core::{Coins, CoinsError, Email, PaymentEventId, Plan, PlanGrant};

pub use memory::MemoryLedgerStore;
pub use postgres::PgLedgerStore;

/// Errors returned by ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Storage is unusable for a reason other than a database error.
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// Data in the store is inconsistent.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// The account does not exist.
    #[error("account not found")]
    NotFound,

    /// A debit larger than the current balance.
    #[error("insufficient coins: balance {balance}, requested {requested}")]
    InsufficientCoins {
        /// Coins available.
        balance: i64,
        /// Coins requested.
        requested: i64,
    },

    /// Crediting would overflow the balance.
    #[error("coin balance overflow")]
    BalanceOverflow,
}

impl LedgerError {
    /// Whether the failure is in the storage layer, so a webhook delivery
    /// should be retried by the provider.
    #[must_use]
    pub const fn is_storage(&self) -> bool {
        matches!(
            self,
            Self::Database(_) | Self::Unavailable(_) | Self::DataCorruption(_)
        )
    }
}

impl From<CoinsError> for LedgerError {
    fn from(err: CoinsError) -> Self {
        match err {
            CoinsError::Insufficient { balance, requested } => {
                Self::InsufficientCoins { balance, requested }
            }
            CoinsError::Overflow => Self::BalanceOverflow,
            CoinsError::Negative(value) => {
                Self::DataCorruption(format!("negative coin amount: {value}"))
            }
        }
    }
}

/// A customer's entitlement state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    /// Normalized customer email (account key).
    pub email: Email,
    /// Current plan tier.
    pub plan: Plan,
    /// Spendable coins.
    pub coin_balance: Coins,
    /// When the account was first credited.
    pub created_at: DateTime<Utc>,
    /// When the account last changed.
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// A fresh account: no plan, zero coins.
    #[must_use]
    pub const fn empty(email: Email, now: DateTime<Utc>) -> Self {
        Self {
            email,
            plan: Plan::None,
            coin_balance: Coins::ZERO,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Result of [`LedgerStore::apply_grant`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GrantOutcome {
    /// The event was new and the grant was committed.
    Applied(Account),
    /// The event had already been applied; nothing changed. Carries the
    /// current state of the account the event was originally applied to.
    Duplicate(Account),
}

impl GrantOutcome {
    /// The account state after the call.
    #[must_use]
    pub const fn account(&self) -> &Account {
        match self {
            Self::Applied(account) | Self::Duplicate(account) => account,
        }
    }

    /// Consume the outcome, returning the account.
    #[must_use]
    pub fn into_account(self) -> Account {
        match self {
            Self::Applied(account) | Self::Duplicate(account) => account,
        }
    }

    /// Whether the event had already been applied.
    #[must_use]
    pub const fn is_duplicate(&self) -> bool {
        matches!(self, Self::Duplicate(_))
    }
}

/// Durable account storage with idempotent grants.
pub trait LedgerStore: Send + Sync {
    /// Credit `grant` to `email` for payment event `event_id`.
    ///
    /// Creates the account (plan `none`, zero coins) first if it does not
    /// exist. Presenting an event id that was already applied returns
    /// [`GrantOutcome::Duplicate`] without crediting again.
    fn apply_grant(
        &self,
        event_id: &PaymentEventId,
        email: &Email,
        grant: &PlanGrant,
    ) -> impl Future<Output = Result<GrantOutcome, LedgerError>> + Send;

    /// Fetch an account, `None` if it has never been credited.
    fn get_account(
        &self,
        email: &Email,
    ) -> impl Future<Output = Result<Option<Account>, LedgerError>> + Send;

    /// Debit `amount` coins.
    ///
    /// Fails with [`LedgerError::NotFound`] for unknown accounts and
    /// [`LedgerError::InsufficientCoins`] rather than overdrawing.
    fn spend(
        &self,
        email: &Email,
        amount: Coins,
    ) -> impl Future<Output = Result<Account, LedgerError>> + Send;

    /// Check that the store is reachable.
    fn ping(&self) -> impl Future<Output = Result<(), LedgerError>> + Send;
}

/// The ledger backend selected at start-up.
#[derive(Debug, Clone)]
pub enum Ledger {
    Postgres(PgLedgerStore),
    Memory(Arc<MemoryLedgerStore>),
}

impl Ledger {
    /// A fresh, empty in-memory ledger.
    #[must_use]
    pub fn memory() -> Self {
        Self::Memory(Arc::new(MemoryLedgerStore::new()))
    }

    /// Short backend name for logs.
    #[must_use]
    pub const fn backend_name(&self) -> &'static str {
        match self {
            Self::Postgres(_) => "postgres",
            Self::Memory(_) => "memory",
        }
    }
}

impl LedgerStore for Ledger {
    async fn apply_grant(
        &self,
        event_id: &PaymentEventId,
        email: &Email,
        grant: &PlanGrant,
    ) -> Result<GrantOutcome, LedgerError> {
        match self {
            Self::Postgres(store) => store.apply_grant(event_id, email, grant).await,
            Self::Memory(store) => store.apply_grant(event_id, email, grant).await,
        }
    }

    async fn get_account(&self, email: &Email) -> Result<Option<Account>, LedgerError> {
        match self {
            Self::Postgres(store) => store.get_account(email).await,
            Self::Memory(store) => store.get_account(email).await,
        }
    }

    async fn spend(&self, email: &Email, amount: Coins) -> Result<Account, LedgerError> {
        match self {
            Self::Postgres(store) => store.spend(email, amount).await,
            Self::Memory(store) => store.spend(email, amount).await,
        }
    }

    async fn ping(&self) -> Result<(), LedgerError> {
        match self {
            Self::Postgres(store) => store.ping().await,
            Self::Memory(store) => store.ping().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coins_error_mapping() {
        assert!(matches!(
            LedgerError::from(CoinsError::Insufficient {
                balance: 1,
                requested: 2
            }),
            LedgerError::InsufficientCoins {
                balance: 1,
                requested: 2
            }
        ));
        assert!(matches!(
            LedgerError::from(CoinsError::Overflow),
            LedgerError::BalanceOverflow
        ));
    }

    #[test]
    fn test_is_storage() {
        assert!(LedgerError::Unavailable("down".into()).is_storage());
        assert!(!LedgerError::NotFound.is_storage());
        assert!(!LedgerError::BalanceOverflow.is_storage());
    }
}

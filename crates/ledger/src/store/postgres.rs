//! `PostgreSQL` ledger backend.
//!
//! # Tables (schema `ledger`)
//!
//! - `account` - one row per customer email: plan and coin balance
//! - `processed_event` - one row per applied payment event
//!
//! A grant runs in a single transaction:
//!
//! 1. Claim the event id with `INSERT ... ON CONFLICT DO NOTHING RETURNING`.
//!    A concurrent delivery of the same event blocks on the primary key until
//!    the first transaction finishes, then sees the conflict.
//! 2. Upsert the account, adding the grant to the balance. The row lock taken
//!    by the upsert serializes concurrent grants for the same customer.
//! 3. Commit. Dropping the transaction early rolls both steps back.
//!
//! The `processed_event.email` foreign key is deferred so the claim can be
//! written before the account row exists.

use sqlx::PgPool;
use tracing::{debug, instrument};

use droxion_core::{Coins, Email, PaymentEventId, PlanGrant};

use super::{Account, GrantOutcome, LedgerError, LedgerStore};

/// SQLSTATE raised when `coin_balance` would exceed `BIGINT`.
const NUMERIC_VALUE_OUT_OF_RANGE: &str = "22003";

const ACCOUNT_COLUMNS: &str = "email, plan, coin_balance, created_at, updated_at";

/// [`LedgerStore`] backed by `PostgreSQL`.
#[derive(Debug, Clone)]
pub struct PgLedgerStore {
    pool: PgPool,
}

impl PgLedgerStore {
    /// Create a store over an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn account_for_event(&self, event_id: &PaymentEventId) -> Result<Account, LedgerError> {
        let account = sqlx::query_as::<_, Account>(
            r"
            SELECT a.email, a.plan, a.coin_balance, a.created_at, a.updated_at
            FROM ledger.processed_event e
            JOIN ledger.account a ON a.email = e.email
            WHERE e.event_id = $1
            ",
        )
        .bind(event_id)
        .fetch_optional(&self.pool)
        .await?;

        account.ok_or_else(|| {
            LedgerError::DataCorruption(format!("event {event_id} recorded without an account"))
        })
    }
}

impl LedgerStore for PgLedgerStore {
    #[instrument(skip(self, grant), fields(plan = %grant.plan, coins = %grant.coins))]
    async fn apply_grant(
        &self,
        event_id: &PaymentEventId,
        email: &Email,
        grant: &PlanGrant,
    ) -> Result<GrantOutcome, LedgerError> {
        let mut tx = self.pool.begin().await?;

        let claimed: Option<String> = sqlx::query_scalar(
            r"
            INSERT INTO ledger.processed_event (event_id, email, plan, coins_granted)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (event_id) DO NOTHING
            RETURNING event_id
            ",
        )
        .bind(event_id)
        .bind(email)
        .bind(grant.plan)
        .bind(grant.coins)
        .fetch_optional(&mut *tx)
        .await?;

        if claimed.is_none() {
            tx.rollback().await?;
            debug!(event_id = %event_id, "Event already applied");
            return Ok(GrantOutcome::Duplicate(self.account_for_event(event_id).await?));
        }

        let account = sqlx::query_as::<_, Account>(&format!(
            r"
            INSERT INTO ledger.account (email, plan, coin_balance)
            VALUES ($1, $2, $3)
            ON CONFLICT (email) DO UPDATE SET
                coin_balance = ledger.account.coin_balance + EXCLUDED.coin_balance,
                plan = EXCLUDED.plan,
                updated_at = NOW()
            RETURNING {ACCOUNT_COLUMNS}
            "
        ))
        .bind(email)
        .bind(grant.plan)
        .bind(grant.coins)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.code().as_deref() == Some(NUMERIC_VALUE_OUT_OF_RANGE)
            {
                return LedgerError::BalanceOverflow;
            }
            LedgerError::Database(e)
        })?;

        tx.commit().await?;

        Ok(GrantOutcome::Applied(account))
    }

    async fn get_account(&self, email: &Email) -> Result<Option<Account>, LedgerError> {
        let account = sqlx::query_as::<_, Account>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM ledger.account WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(account)
    }

    #[instrument(skip(self))]
    async fn spend(&self, email: &Email, amount: Coins) -> Result<Account, LedgerError> {
        // Conditional debit: the WHERE clause and the update happen under the
        // same row lock, so concurrent spends cannot overdraw.
        let debited = sqlx::query_as::<_, Account>(&format!(
            r"
            UPDATE ledger.account
            SET coin_balance = coin_balance - $2, updated_at = NOW()
            WHERE email = $1 AND coin_balance >= $2
            RETURNING {ACCOUNT_COLUMNS}
            "
        ))
        .bind(email)
        .bind(amount)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(account) = debited {
            return Ok(account);
        }

        match self.get_account(email).await? {
            Some(account) => Err(LedgerError::InsufficientCoins {
                balance: account.coin_balance.as_i64(),
                requested: amount.as_i64(),
            }),
            None => Err(LedgerError::NotFound),
        }
    }

    async fn ping(&self) -> Result<(), LedgerError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

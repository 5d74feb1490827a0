//! In-process ledger backend.
//!
//! Each customer gets its own mutex-guarded slot, so grants for one customer
//! are serialized while different customers proceed independently. The
//! processed-event map is consulted and updated while the customer's slot is
//! locked, which keeps the marker and the balance change atomic.
//!
//! State lives only as long as the process. Use it for local development
//! and tests; production runs on [`super::PgLedgerStore`].

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use chrono::Utc;
use tracing::{debug, instrument};

use droxion_core::{Coins, Email, PaymentEventId, PlanGrant};

use super::{Account, GrantOutcome, LedgerError, LedgerStore};

/// An account slot. `None` until the first grant creates the account.
type Slot = Arc<Mutex<Option<Account>>>;

/// Process-local [`LedgerStore`].
#[derive(Debug, Default)]
pub struct MemoryLedgerStore {
    accounts: RwLock<HashMap<Email, Slot>>,
    processed: Mutex<HashMap<PaymentEventId, Email>>,
}

fn poisoned<T>(_: PoisonError<T>) -> LedgerError {
    LedgerError::Unavailable("ledger lock poisoned".to_owned())
}

impl MemoryLedgerStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of payment events applied so far.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Unavailable` if a lock is poisoned.
    pub fn processed_count(&self) -> Result<usize, LedgerError> {
        Ok(self.processed.lock().map_err(poisoned)?.len())
    }

    fn existing_slot(&self, email: &Email) -> Result<Option<Slot>, LedgerError> {
        Ok(self.accounts.read().map_err(poisoned)?.get(email).cloned())
    }

    fn slot(&self, email: &Email) -> Result<Slot, LedgerError> {
        if let Some(slot) = self.existing_slot(email)? {
            return Ok(slot);
        }
        let mut accounts = self.accounts.write().map_err(poisoned)?;
        Ok(Arc::clone(accounts.entry(email.clone()).or_default()))
    }

    fn read_account(&self, email: &Email) -> Result<Option<Account>, LedgerError> {
        let Some(slot) = self.existing_slot(email)? else {
            return Ok(None);
        };
        let account = slot.lock().map_err(poisoned)?.clone();
        Ok(account)
    }

    fn apply_grant_locked(
        &self,
        event_id: &PaymentEventId,
        email: &Email,
        grant: &PlanGrant,
    ) -> Result<GrantOutcome, LedgerError> {
        // Replays are answered without touching the account map, so a replay
        // carrying another email never creates a slot for it.
        let already = self.processed.lock().map_err(poisoned)?.get(event_id).cloned();

        let owner = match already {
            Some(owner) => owner,
            None => {
                let slot = self.slot(email)?;
                let mut current = slot.lock().map_err(poisoned)?;
                let mut processed = self.processed.lock().map_err(poisoned)?;

                // Re-check under the slot lock: a concurrent delivery of the
                // same event may have won since the first look.
                if let Some(owner) = processed.get(event_id) {
                    owner.clone()
                } else {
                    let now = Utc::now();
                    let mut account = current
                        .clone()
                        .unwrap_or_else(|| Account::empty(email.clone(), now));
                    account.coin_balance = account.coin_balance.checked_add(grant.coins)?;
                    account.plan = grant.plan;
                    account.updated_at = now;

                    processed.insert(event_id.clone(), email.clone());
                    *current = Some(account.clone());
                    return Ok(GrantOutcome::Applied(account));
                }
            }
        };

        // Both guards are released here, so reading the owner's slot cannot
        // deadlock against a grant that holds it.
        debug!(event_id = %event_id, owner = %owner, "Event already applied");
        let account = self.read_account(&owner)?.ok_or_else(|| {
            LedgerError::DataCorruption(format!(
                "event {event_id} recorded for missing account {owner}"
            ))
        })?;
        Ok(GrantOutcome::Duplicate(account))
    }

    fn spend_locked(&self, email: &Email, amount: Coins) -> Result<Account, LedgerError> {
        let slot = self.existing_slot(email)?.ok_or(LedgerError::NotFound)?;
        let mut current = slot.lock().map_err(poisoned)?;
        let account = current.as_mut().ok_or(LedgerError::NotFound)?;

        account.coin_balance = account.coin_balance.checked_sub(amount)?;
        account.updated_at = Utc::now();
        Ok(account.clone())
    }
}

impl LedgerStore for MemoryLedgerStore {
    #[instrument(skip(self, grant), fields(plan = %grant.plan, coins = %grant.coins))]
    async fn apply_grant(
        &self,
        event_id: &PaymentEventId,
        email: &Email,
        grant: &PlanGrant,
    ) -> Result<GrantOutcome, LedgerError> {
        self.apply_grant_locked(event_id, email, grant)
    }

    async fn get_account(&self, email: &Email) -> Result<Option<Account>, LedgerError> {
        self.read_account(email)
    }

    #[instrument(skip(self))]
    async fn spend(&self, email: &Email, amount: Coins) -> Result<Account, LedgerError> {
        self.spend_locked(email, amount)
    }

    async fn ping(&self) -> Result<(), LedgerError> {
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use droxion_core::{Plan, PlanCatalog};

    use super::*;

    fn email(s: &str) -> Email {
        Email::parse(s).unwrap()
    }

    fn event(s: &str) -> PaymentEventId {
        PaymentEventId::parse(s).unwrap()
    }

    #[tokio::test]
    async fn test_first_grant_creates_account() {
        let store = MemoryLedgerStore::new();
        let grant = PlanCatalog::standard().resolve(Some("starter"));

        let outcome = store
            .apply_grant(&event("evt_1"), &email("a@x.com"), &grant)
            .await
            .unwrap();

        assert!(!outcome.is_duplicate());
        let account = outcome.account();
        assert_eq!(account.plan, Plan::Starter);
        assert_eq!(account.coin_balance, Coins::from(50));
    }

    #[tokio::test]
    async fn test_redelivery_is_not_credited_twice() {
        let store = MemoryLedgerStore::new();
        let grant = PlanCatalog::standard().resolve(Some("starter"));
        let id = event("evt_1");
        let who = email("a@x.com");

        store.apply_grant(&id, &who, &grant).await.unwrap();
        let second = store.apply_grant(&id, &who, &grant).await.unwrap();

        assert!(second.is_duplicate());
        assert_eq!(second.account().coin_balance, Coins::from(50));
        assert_eq!(store.processed_count().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_for_other_email_touches_nothing() {
        let store = MemoryLedgerStore::new();
        let grant = PlanCatalog::standard().resolve(Some("pro"));
        let id = event("evt_9");

        store.apply_grant(&id, &email("a@x.com"), &grant).await.unwrap();
        let replay = store
            .apply_grant(&id, &email("b@x.com"), &grant)
            .await
            .unwrap();

        assert!(replay.is_duplicate());
        assert_eq!(replay.account().email, email("a@x.com"));
        assert!(store.get_account(&email("b@x.com")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_replays_for_other_emails_do_not_grow_the_map() {
        let store = MemoryLedgerStore::new();
        let grant = PlanCatalog::standard().resolve(Some("starter"));
        let id = event("evt_replayed");

        store.apply_grant(&id, &email("owner@x.com"), &grant).await.unwrap();
        for i in 0..10 {
            let replay = store
                .apply_grant(&id, &email(&format!("other{i}@x.com")), &grant)
                .await
                .unwrap();
            assert!(replay.is_duplicate());
        }

        assert_eq!(store.accounts.read().unwrap().len(), 1);
        assert_eq!(store.processed_count().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_grants_accumulate_and_set_plan() {
        let store = MemoryLedgerStore::new();
        let catalog = PlanCatalog::standard();
        let who = email("a@x.com");

        store
            .apply_grant(&event("evt_1"), &who, &catalog.resolve(Some("starter")))
            .await
            .unwrap();
        let account = store
            .apply_grant(&event("evt_2"), &who, &catalog.resolve(Some("business")))
            .await
            .unwrap()
            .into_account();

        assert_eq!(account.plan, Plan::Business);
        assert_eq!(account.coin_balance, Coins::from(450));
    }

    #[tokio::test]
    async fn test_concurrent_grants_do_not_lose_updates() {
        let store = Arc::new(MemoryLedgerStore::new());
        let grant = PlanCatalog::standard().resolve(Some("pro"));
        let who = email("race@x.com");

        let handles: Vec<_> = (0..64)
            .map(|i| {
                let store = Arc::clone(&store);
                let grant = grant.clone();
                let who = who.clone();
                tokio::spawn(async move {
                    store
                        .apply_grant(&event(&format!("evt_{i}")), &who, &grant)
                        .await
                })
            })
            .collect();

        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let account = store.get_account(&who).await.unwrap().unwrap();
        assert_eq!(account.coin_balance, Coins::from(64 * 150));
    }

    #[tokio::test]
    async fn test_concurrent_redeliveries_credit_once() {
        let store = Arc::new(MemoryLedgerStore::new());
        let grant = PlanCatalog::standard().resolve(Some("business"));
        let who = email("dup@x.com");

        let handles: Vec<_> = (0..32)
            .map(|_| {
                let store = Arc::clone(&store);
                let grant = grant.clone();
                let who = who.clone();
                tokio::spawn(async move {
                    store.apply_grant(&event("evt_same"), &who, &grant).await
                })
            })
            .collect();

        let mut applied = 0;
        for handle in handles {
            if !handle.await.unwrap().unwrap().is_duplicate() {
                applied += 1;
            }
        }

        assert_eq!(applied, 1);
        let account = store.get_account(&who).await.unwrap().unwrap();
        assert_eq!(account.coin_balance, Coins::from(400));
    }

    #[tokio::test]
    async fn test_spend() {
        let store = MemoryLedgerStore::new();
        let who = email("a@x.com");
        store
            .apply_grant(
                &event("evt_1"),
                &who,
                &PlanCatalog::standard().resolve(Some("starter")),
            )
            .await
            .unwrap();

        let account = store.spend(&who, Coins::from(1)).await.unwrap();
        assert_eq!(account.coin_balance, Coins::from(49));

        let err = store.spend(&who, Coins::from(50)).await.unwrap_err();
        assert!(matches!(
            err,
            LedgerError::InsufficientCoins {
                balance: 49,
                requested: 50
            }
        ));
    }

    #[tokio::test]
    async fn test_spend_unknown_account() {
        let store = MemoryLedgerStore::new();
        let err = store
            .spend(&email("ghost@x.com"), Coins::from(1))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::NotFound));
    }

    #[tokio::test]
    async fn test_concurrent_spends_never_overdraw() {
        let store = Arc::new(MemoryLedgerStore::new());
        let who = email("spender@x.com");
        store
            .apply_grant(
                &event("evt_1"),
                &who,
                &PlanCatalog::standard().resolve(Some("starter")),
            )
            .await
            .unwrap();

        let handles: Vec<_> = (0..80)
            .map(|_| {
                let store = Arc::clone(&store);
                let who = who.clone();
                tokio::spawn(async move { store.spend(&who, Coins::from(1)).await })
            })
            .collect();

        let mut succeeded = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                succeeded += 1;
            }
        }

        assert_eq!(succeeded, 50);
        let account = store.get_account(&who).await.unwrap().unwrap();
        assert_eq!(account.coin_balance, Coins::ZERO);
    }
}

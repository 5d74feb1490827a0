//! Application state shared across handlers.

use std::sync::Arc;

use droxion_core::{PlanCatalog, UnknownPlan};

use crate::config::LedgerConfig;
use crate::store::Ledger;
use crate::webhook::SignatureVerifier;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// the ledger backend, the plan catalog and the webhook verifier.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: LedgerConfig,
    ledger: Ledger,
    catalog: PlanCatalog,
    verifier: SignatureVerifier,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Arguments
    ///
    /// * `config` - Ledger configuration
    /// * `ledger` - Storage backend selected at start-up
    ///
    /// # Errors
    ///
    /// Returns `UnknownPlan` if the configured default plan is not purchasable.
    pub fn new(config: LedgerConfig, ledger: Ledger) -> Result<Self, UnknownPlan> {
        let catalog = PlanCatalog::standard().with_default_plan(config.default_plan)?;
        let verifier =
            SignatureVerifier::new(config.webhook_secret.clone(), config.signature_tolerance);

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                ledger,
                catalog,
                verifier,
            }),
        })
    }

    /// Get a reference to the ledger configuration.
    #[must_use]
    pub fn config(&self) -> &LedgerConfig {
        &self.inner.config
    }

    /// Get a reference to the ledger backend.
    #[must_use]
    pub fn ledger(&self) -> &Ledger {
        &self.inner.ledger
    }

    /// Get a reference to the plan catalog.
    #[must_use]
    pub fn catalog(&self) -> &PlanCatalog {
        &self.inner.catalog
    }

    /// Get a reference to the webhook signature verifier.
    #[must_use]
    pub fn verifier(&self) -> &SignatureVerifier {
        &self.inner.verifier
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use droxion_core::{Coins, Plan};
    use secrecy::SecretString;

    use super::*;

    #[test]
    fn test_catalog_uses_configured_default() {
        let mut config = LedgerConfig::in_memory(SecretString::from("whsec_test"));
        config.default_plan = Plan::Business;

        let state = AppState::new(config, Ledger::memory()).unwrap();

        assert_eq!(state.catalog().default_plan(), Plan::Business);
        assert_eq!(state.catalog().default_grant(), Coins::from(400));
        assert_eq!(state.ledger().backend_name(), "memory");
    }
}

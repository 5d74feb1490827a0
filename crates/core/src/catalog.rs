//! Static plan catalog.
//!
//! Maps purchasable plan identifiers to the number of coins a purchase
//! grants. The catalog is immutable after construction and performs no I/O.
//!
//! | Plan       | Grant |
//! |------------|-------|
//! | `starter`  | 50    |
//! | `pro`      | 150   |
//! | `business` | 400   |
//!
//! Purchases that name no plan, or a plan the catalog does not recognize,
//! are credited with the catalog's default plan (`pro` unless configured
//! otherwise).

use serde::Serialize;

use crate::types::{Coins, Plan};

/// Error returned by [`PlanCatalog::grant_for`] for an unrecognized plan id.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown plan: {0}")]
pub struct UnknownPlan(pub String);

/// Why a purchase was credited with the default plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", content = "plan_id", rename_all = "snake_case")]
pub enum FallbackReason {
    /// The event carried no plan id.
    Missing,
    /// The event named a plan the catalog does not know.
    Unknown(String),
}

/// The outcome of resolving a purchase's plan id against the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanGrant {
    /// The plan the account moves to.
    pub plan: Plan,
    /// Coins credited for the purchase.
    pub coins: Coins,
    /// Set when the default plan was used instead of the requested one.
    pub fallback: Option<FallbackReason>,
}

/// Immutable plan catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanCatalog {
    starter: Coins,
    pro: Coins,
    business: Coins,
    default_plan: Plan,
}

impl Default for PlanCatalog {
    fn default() -> Self {
        Self::standard()
    }
}

impl PlanCatalog {
    /// The standard catalog: starter 50, pro 150, business 400, default `pro`.
    #[must_use]
    pub const fn standard() -> Self {
        Self {
            starter: Coins::from_u32(50),
            pro: Coins::from_u32(150),
            business: Coins::from_u32(400),
            default_plan: Plan::Pro,
        }
    }

    /// Use `plan` as the fallback for missing or unknown plan ids.
    ///
    /// # Errors
    ///
    /// Returns `UnknownPlan` if `plan` is not purchasable ([`Plan::None`]).
    pub fn with_default_plan(mut self, plan: Plan) -> Result<Self, UnknownPlan> {
        if self.coins_for(plan).is_none() {
            return Err(UnknownPlan(plan.to_string()));
        }
        self.default_plan = plan;
        Ok(self)
    }

    /// The fallback plan.
    #[must_use]
    pub const fn default_plan(&self) -> Plan {
        self.default_plan
    }

    /// Coins granted by the fallback plan.
    #[must_use]
    pub fn default_grant(&self) -> Coins {
        self.coins_for(self.default_plan).unwrap_or(Coins::ZERO)
    }

    /// Coins granted for purchasing `plan`, if it is purchasable.
    #[must_use]
    pub const fn coins_for(&self, plan: Plan) -> Option<Coins> {
        match plan {
            Plan::Starter => Some(self.starter),
            Plan::Pro => Some(self.pro),
            Plan::Business => Some(self.business),
            Plan::None => None,
        }
    }

    /// Look up the grant for a plan id.
    ///
    /// Matching is case-insensitive after trimming.
    ///
    /// # Errors
    ///
    /// Returns `UnknownPlan` if the id does not name a purchasable plan.
    pub fn grant_for(&self, plan_id: &str) -> Result<(Plan, Coins), UnknownPlan> {
        plan_id
            .parse::<Plan>()
            .ok()
            .and_then(|plan| self.coins_for(plan).map(|coins| (plan, coins)))
            .ok_or_else(|| UnknownPlan(plan_id.trim().to_owned()))
    }

    /// Resolve an optional plan id, falling back to the default plan.
    ///
    /// Blank ids are treated as missing.
    #[must_use]
    pub fn resolve(&self, plan_id: Option<&str>) -> PlanGrant {
        let requested = plan_id.map(str::trim).filter(|id| !id.is_empty());

        let Some(id) = requested else {
            return self.fallback(FallbackReason::Missing);
        };

        match self.grant_for(id) {
            Ok((plan, coins)) => PlanGrant {
                plan,
                coins,
                fallback: None,
            },
            Err(UnknownPlan(id)) => self.fallback(FallbackReason::Unknown(id)),
        }
    }

    fn fallback(&self, reason: FallbackReason) -> PlanGrant {
        PlanGrant {
            plan: self.default_plan,
            coins: self.default_grant(),
            fallback: Some(reason),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_grants() {
        let catalog = PlanCatalog::standard();
        assert_eq!(
            catalog.grant_for("starter").unwrap(),
            (Plan::Starter, Coins::from(50))
        );
        assert_eq!(
            catalog.grant_for("pro").unwrap(),
            (Plan::Pro, Coins::from(150))
        );
        assert_eq!(
            catalog.grant_for("business").unwrap(),
            (Plan::Business, Coins::from(400))
        );
    }

    #[test]
    fn test_grant_for_is_case_insensitive() {
        let catalog = PlanCatalog::standard();
        assert_eq!(catalog.grant_for(" Business ").unwrap().0, Plan::Business);
    }

    #[test]
    fn test_grant_for_unknown() {
        let catalog = PlanCatalog::standard();
        assert_eq!(
            catalog.grant_for("enterprise"),
            Err(UnknownPlan("enterprise".to_owned()))
        );
        // `none` is a tier but not something a customer can buy
        assert!(catalog.grant_for("none").is_err());
    }

    #[test]
    fn test_resolve_unknown_falls_back_to_pro() {
        let grant = PlanCatalog::standard().resolve(Some("enterprise"));
        assert_eq!(grant.plan, Plan::Pro);
        assert_eq!(grant.coins, Coins::from(150));
        assert_eq!(
            grant.fallback,
            Some(FallbackReason::Unknown("enterprise".to_owned()))
        );
    }

    #[test]
    fn test_resolve_missing_and_blank() {
        let catalog = PlanCatalog::standard();
        for id in [None, Some(""), Some("   ")] {
            let grant = catalog.resolve(id);
            assert_eq!(grant.plan, Plan::Pro);
            assert_eq!(grant.fallback, Some(FallbackReason::Missing));
        }
    }

    #[test]
    fn test_resolve_known() {
        let grant = PlanCatalog::standard().resolve(Some("starter"));
        assert_eq!(grant.plan, Plan::Starter);
        assert_eq!(grant.coins, Coins::from(50));
        assert_eq!(grant.fallback, None);
    }

    #[test]
    fn test_custom_default_plan() {
        let catalog = PlanCatalog::standard()
            .with_default_plan(Plan::Starter)
            .unwrap();
        assert_eq!(catalog.default_grant(), Coins::from(50));
        assert_eq!(catalog.resolve(None).plan, Plan::Starter);
    }

    #[test]
    fn test_default_plan_must_be_purchasable() {
        assert!(PlanCatalog::standard().with_default_plan(Plan::None).is_err());
    }
}

//! Payment webhook processing.
//!
//! Turns a raw delivery into at most one ledger mutation:
//!
//! 1. [`signature`] - authenticate the body against the shared secret
//! 2. [`event`] - parse the event, extracting completed purchases
//! 3. [`apply_grant`] - resolve the plan against the catalog and credit the
//!    account through a [`LedgerStore`]
//!
//! Nothing is retried here. A storage failure surfaces as an error so the
//! provider redelivers, and redelivery is safe because grants are idempotent
//! per event id.

pub mod event;
pub mod signature;

use thiserror::Error;
use tracing::{info, instrument, warn};

use droxion_core::{Email, FallbackReason, PaymentEventId, PlanCatalog, PlanGrant};

use crate::store::{Account, GrantOutcome, LedgerError, LedgerStore};

pub use event::{CHECKOUT_COMPLETED, EventParseError, PaymentEvent, WebhookEvent, parse_event};
pub use signature::{DEFAULT_TOLERANCE, SIGNATURE_HEADER, SignatureError, SignatureVerifier};

/// Failure to process a webhook delivery.
#[derive(Debug, Error)]
pub enum WebhookError {
    /// The delivery is not authentic.
    #[error("webhook verification failed: {0}")]
    Verification(#[from] SignatureError),

    /// The delivery is authentic but not a usable event.
    #[error("webhook payload rejected: {0}")]
    Parse(#[from] EventParseError),

    /// The ledger could not record the grant.
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),
}

/// What a delivery did to the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// A new purchase was credited.
    Credited {
        /// Account after the grant.
        account: Account,
        /// How the purchase's plan was resolved.
        grant: PlanGrant,
    },
    /// The purchase had already been credited.
    Duplicate {
        /// Current account state.
        account: Account,
    },
    /// Not a purchase; acknowledged without side effects.
    Ignored {
        /// Provider event type.
        kind: String,
    },
}

/// Credit the coins for a purchase of `plan_id` to `email`.
///
/// A missing or unknown plan id is credited with the catalog's default plan
/// and the fallback is logged.
///
/// # Errors
///
/// Returns `LedgerError` if the store fails.
#[instrument(skip(store, catalog))]
pub async fn apply_grant<S: LedgerStore>(
    store: &S,
    catalog: &PlanCatalog,
    event_id: &PaymentEventId,
    email: &Email,
    plan_id: Option<&str>,
) -> Result<(GrantOutcome, PlanGrant), LedgerError> {
    let grant = catalog.resolve(plan_id);

    match &grant.fallback {
        Some(FallbackReason::Unknown(requested)) => warn!(
            event_id = %event_id,
            requested_plan = %requested,
            fallback_plan = %grant.plan,
            coins = %grant.coins,
            "Unknown plan, crediting default plan"
        ),
        Some(FallbackReason::Missing) => info!(
            event_id = %event_id,
            fallback_plan = %grant.plan,
            coins = %grant.coins,
            "No plan in checkout metadata, crediting default plan"
        ),
        None => {}
    }

    let outcome = store.apply_grant(event_id, email, &grant).await?;
    Ok((outcome, grant))
}

/// Verify, parse, and apply one webhook delivery.
///
/// # Errors
///
/// - `WebhookError::Verification` - bad or missing signature; nothing is read
///   from the payload
/// - `WebhookError::Parse` - authentic but malformed event
/// - `WebhookError::Ledger` - the grant could not be committed
pub async fn process_delivery<S: LedgerStore>(
    store: &S,
    catalog: &PlanCatalog,
    verifier: &SignatureVerifier,
    payload: &[u8],
    signature: Option<&str>,
) -> Result<WebhookOutcome, WebhookError> {
    if let Err(err) = verifier.verify(payload, signature) {
        warn!(security = true, error = %err, "Rejected unauthenticated webhook delivery");
        return Err(err.into());
    }

    let event = parse_event(payload)?;

    let payment = match event {
        WebhookEvent::CheckoutCompleted(payment) => payment,
        WebhookEvent::Other { event_id, kind } => {
            info!(event_id = %event_id, kind = %kind, "Ignoring webhook event");
            return Ok(WebhookOutcome::Ignored { kind });
        }
    };

    info!(
        event_id = %payment.event_id,
        email = %payment.customer_email,
        plan = ?payment.plan_id,
        "Payment complete"
    );

    let (outcome, grant) = apply_grant(
        store,
        catalog,
        &payment.event_id,
        &payment.customer_email,
        payment.plan_id.as_deref(),
    )
    .await?;

    Ok(match outcome {
        GrantOutcome::Applied(account) => {
            info!(
                event_id = %payment.event_id,
                email = %account.email,
                coins = %grant.coins,
                balance = %account.coin_balance,
                "Coins credited"
            );
            WebhookOutcome::Credited { account, grant }
        }
        GrantOutcome::Duplicate(account) => {
            info!(event_id = %payment.event_id, "Duplicate delivery, already credited");
            WebhookOutcome::Duplicate { account }
        }
    })
}

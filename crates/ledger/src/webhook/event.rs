//! Payment webhook event parsing.
//!
//! Only `checkout.session.completed` carries a purchase. Every other event
//! type is parsed just far enough to log its id and type.

use serde::Deserialize;
use thiserror::Error;

use droxion_core::{Email, EmailError, EventIdError, PaymentEventId};

/// Event type announcing a completed checkout.
pub const CHECKOUT_COMPLETED: &str = "checkout.session.completed";

/// Errors produced when a verified payload cannot be interpreted.
#[derive(Debug, Error)]
pub enum EventParseError {
    /// The body is not a JSON event envelope.
    #[error("invalid event JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The event id is empty or too long.
    #[error("invalid event id: {0}")]
    InvalidEventId(#[from] EventIdError),

    /// A completed checkout without a customer email.
    #[error("event {event_id} has no customer email")]
    MissingEmail {
        /// Offending event.
        event_id: PaymentEventId,
    },

    /// A completed checkout with an unusable customer email.
    #[error("event {event_id} has an invalid customer email: {source}")]
    InvalidEmail {
        /// Offending event.
        event_id: PaymentEventId,
        /// Why the email was rejected.
        source: EmailError,
    },
}

/// A completed purchase extracted from a verified webhook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentEvent {
    /// Provider event id, the deduplication key.
    pub event_id: PaymentEventId,
    /// Purchasing customer.
    pub customer_email: Email,
    /// Plan named in the checkout metadata, if any.
    pub plan_id: Option<String>,
}

/// A verified webhook event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookEvent {
    /// A completed checkout that should credit coins.
    CheckoutCompleted(PaymentEvent),
    /// Any other event type; acknowledged without side effects.
    Other {
        /// Provider event id.
        event_id: PaymentEventId,
        /// Provider event type.
        kind: String,
    },
}

#[derive(Debug, Deserialize)]
struct Envelope {
    id: String,
    #[serde(rename = "type")]
    kind: String,
    data: EnvelopeData,
}

#[derive(Debug, Deserialize)]
struct EnvelopeData {
    object: serde_json::Value,
}

#[derive(Debug, Default, Deserialize)]
struct CheckoutSession {
    customer_email: Option<String>,
    customer_details: Option<CustomerDetails>,
    metadata: Option<Metadata>,
}

#[derive(Debug, Default, Deserialize)]
struct CustomerDetails {
    email: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Metadata {
    plan: Option<String>,
}

/// Parse a verified webhook body.
///
/// # Errors
///
/// Returns `EventParseError` if the body is not an event envelope, or if a
/// completed checkout lacks a valid customer email.
pub fn parse_event(payload: &[u8]) -> Result<WebhookEvent, EventParseError> {
    let envelope: Envelope = serde_json::from_slice(payload)?;
    let event_id = PaymentEventId::parse(&envelope.id)?;

    if envelope.kind != CHECKOUT_COMPLETED {
        return Ok(WebhookEvent::Other {
            event_id,
            kind: envelope.kind,
        });
    }

    let session: CheckoutSession = serde_json::from_value(envelope.data.object)?;

    let raw_email = session
        .customer_email
        .filter(|e| !e.trim().is_empty())
        .or_else(|| session.customer_details.and_then(|d| d.email))
        .filter(|e| !e.trim().is_empty());

    let Some(raw_email) = raw_email else {
        return Err(EventParseError::MissingEmail { event_id });
    };

    let customer_email = match Email::parse(&raw_email) {
        Ok(email) => email,
        Err(source) => return Err(EventParseError::InvalidEmail { event_id, source }),
    };

    let plan_id = session
        .metadata
        .and_then(|m| m.plan)
        .map(|p| p.trim().to_owned())
        .filter(|p| !p.is_empty());

    Ok(WebhookEvent::CheckoutCompleted(PaymentEvent {
        event_id,
        customer_email,
        plan_id,
    }))
}

//! Core types for the Droxion ledger.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod coins;
pub mod email;
pub mod event_id;
pub mod plan;

pub use coins::{Coins, CoinsError};
pub use email::{Email, EmailError};
pub use event_id::{EventIdError, PaymentEventId};
pub use plan::{Plan, PlanParseError};

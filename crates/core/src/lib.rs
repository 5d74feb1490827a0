//! Droxion Core - Shared domain types for the credit ledger.
//!
//! This crate provides the types used across all Droxion ledger components:
//! - `ledger` - Payment webhook receiver and account store
//! - `cli` - Command-line tools for migrations and account maintenance
//!
//! # Architecture
//!
//! The core crate contains only types and pure lookups - no I/O, no database
//! access, no HTTP clients. This keeps it lightweight and allows it to be used
//! anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for emails, coin amounts, plans, and event IDs
//! - [`catalog`] - The static plan catalog mapping plan identifiers to coin grants

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod catalog;
pub mod types;

pub use catalog::{FallbackReason, PlanCatalog, PlanGrant, UnknownPlan};
pub use types::*;

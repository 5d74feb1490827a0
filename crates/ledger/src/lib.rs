//! Droxion ledger library.
//!
//! Receives signed payment webhooks and credits plan coins to customer
//! accounts, exactly once per payment event. Exposed as a library so the
//! router can be driven in-process by tests and the CLI can reuse the
//! store.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod state;
pub mod store;
pub mod webhook;

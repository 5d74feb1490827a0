//! CLI subcommands.

pub mod account;
pub mod migrate;

use secrecy::SecretString;

/// Read the ledger database URL, falling back to `DATABASE_URL`.
pub fn database_url() -> Option<SecretString> {
    dotenvy::dotenv().ok();

    std::env::var("LEDGER_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .ok()
        .map(SecretString::from)
}

//! Droxion CLI - Database migrations and account management.
//!
//! # Usage
//!
//! ```bash
//! # Run ledger database migrations
//! droxion-cli migrate
//!
//! # Show an account
//! droxion-cli account show user@example.com
//!
//! # Credit a purchase by hand (idempotent per event id)
//! droxion-cli account grant --event-id manual_2026_03_01 --email user@example.com --plan pro
//!
//! # Debit coins
//! droxion-cli account spend user@example.com 10
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `account` - Inspect and adjust coin balances

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "droxion-cli")]
#[command(author, version, about = "Droxion ledger CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run ledger database migrations
    Migrate,
    /// Inspect and adjust customer accounts
    Account {
        #[command(subcommand)]
        action: AccountAction,
    },
}

#[derive(Subcommand)]
enum AccountAction {
    /// Print an account as JSON
    Show {
        /// Customer email address
        email: String,
    },
    /// Credit a plan purchase, exactly once per event id
    Grant {
        /// Unique id for this credit; re-running with the same id is a no-op
        #[arg(long)]
        event_id: String,

        /// Customer email address
        #[arg(short, long)]
        email: String,

        /// Plan (`starter`, `pro`, `business`); defaults to the catalog default
        #[arg(short, long)]
        plan: Option<String>,
    },
    /// Debit coins from an account
    Spend {
        /// Customer email address
        email: String,

        /// Coins to debit
        amount: i64,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Account { action } => match action {
            AccountAction::Show { email } => commands::account::show(&email).await?,
            AccountAction::Grant {
                event_id,
                email,
                plan,
            } => commands::account::grant(&event_id, &email, plan.as_deref()).await?,
            AccountAction::Spend { email, amount } => {
                commands::account::spend(&email, amount).await?;
            }
        },
    }
    Ok(())
}

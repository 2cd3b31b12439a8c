//! Charitrace server.
//!
//! # Architecture Overview
//!
//! ```text
//!   payment confirmation ──▶ ┌──────────────────────────────────────────┐
//!   admin / CLI ───────────▶ │  http (axum)                             │
//!                            │    handlers ─▶ VerificationService ──────┼──▶ ChainClient ──▶ DonationLedger
//!                            │                      │        ▲          │      (alloy)         contract
//!                            │                      ▼        │          │
//!                            │    DonationStore + VerificationLedger     │
//!                            │            (sqlx / SQLite)   sweeper ─────┤
//!                            └──────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;

use charitrace::config::loader::{load_config, load_default};
use charitrace::lifecycle::startup;
use charitrace::observability::logging;

#[derive(Parser)]
#[command(name = "charitrace")]
#[command(about = "Donation verification service", long_about = None)]
#[command(version)]
struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long, env = "CHARITRACE_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => load_default()?,
    };

    logging::init(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "charitrace starting");
    tracing::info!(
        config = ?args.config,
        bind_address = %config.server.bind_address,
        database = %config.database.url,
        chain_enabled = config.blockchain.enabled,
        "Configuration loaded"
    );

    startup::run(config).await?;
    Ok(())
}

//! Startup orchestration.
//!
//! # Responsibilities
//! - Initialize subsystems in dependency order
//! - Compose the services (explicit dependency injection)
//! - Start background tasks, bind the listener, serve until shutdown
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - A disabled chain still starts the service; verifications queue up as
//!   retryable records

use std::sync::Arc;

use thiserror::Error;
use tokio::net::TcpListener;

use crate::blockchain::{ChainClient, ChainError, ContractClient, DisabledChain, Wallet};
use crate::config::CharitraceConfig;
use crate::db::{Database, StoreError};
use crate::http::{AppState, HttpServer};
use crate::lifecycle::shutdown::Shutdown;
use crate::lifecycle::signals::spawn_signal_handler;
use crate::observability::metrics;
use crate::verification::{VerificationService, VerificationSweeper};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("database initialization failed: {0}")]
    Database(#[from] StoreError),

    #[error("blockchain initialization failed: {0}")]
    Chain(#[from] ChainError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Build the chain client described by `config`.
pub async fn build_chain_client(
    config: &CharitraceConfig,
) -> Result<Arc<dyn ChainClient>, StartupError> {
    if !config.blockchain.enabled {
        tracing::warn!("Blockchain integration disabled; verifications will stay pending");
        return Ok(Arc::new(DisabledChain));
    }

    let wallet = Wallet::from_env(config.blockchain.chain_id)?;
    let client =
        ContractClient::new(config.blockchain.clone(), config.retries.clone(), wallet).await?;
    Ok(Arc::new(client))
}

/// Wire the application state around an already connected database and
/// chain client.
pub fn compose(db: Database, chain: Arc<dyn ChainClient>, config: CharitraceConfig) -> AppState {
    let store = Arc::new(db.clone());
    let verification = Arc::new(VerificationService::new(
        store.clone(),
        store,
        chain.clone(),
    ));

    AppState {
        db,
        chain,
        verification,
        config: Arc::new(config),
    }
}

/// Run the service until SIGINT/SIGTERM.
pub async fn run(config: CharitraceConfig) -> Result<(), StartupError> {
    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    // 1. Storage
    let db = Database::connect(&config.database).await?;
    if config.database.run_migrations {
        db.run_migrations().await?;
        tracing::info!("Migrations applied");
    }

    // 2. Chain
    let chain = build_chain_client(&config).await?;
    metrics::record_chain_health(chain.is_healthy().await);

    // 3. Services
    let state = compose(db.clone(), chain, config.clone());
    let shutdown = Shutdown::new();

    let sweeper = if config.verification.sweep_enabled {
        let sweeper = VerificationSweeper::new(state.verification.clone(), &config.verification);
        Some(tokio::spawn(sweeper.run(shutdown.subscribe())))
    } else {
        tracing::info!("Verification sweeper disabled");
        None
    };

    // 4. Listener
    let listener = TcpListener::bind(&config.server.bind_address).await?;
    tracing::info!(
        address = %listener.local_addr()?,
        mode = ?config.verification.mode,
        chain_enabled = config.blockchain.enabled,
        "Listening for connections"
    );

    spawn_signal_handler(shutdown.clone());
    let served = HttpServer::new(state).run(listener, shutdown.subscribe()).await;

    // Stop the sweeper even if the server failed.
    shutdown.trigger();
    if let Some(handle) = sweeper {
        if let Err(e) = handle.await {
            tracing::error!(error = %e, "Verification sweeper task failed");
        }
    }
    db.close().await;

    served?;
    tracing::info!("Shutdown complete");
    Ok(())
}

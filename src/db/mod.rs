//! Persistence subsystem.
//!
//! # Data Flow
//! ```text
//! payment flow ──▶ DonationStore (donations table)
//!                        │ read-only
//!                        ▼
//! verification ──▶ VerificationLedger (verification_records table)
//! ```
//!
//! # Design Decisions
//! - `verification_records.donation_id` is UNIQUE; a losing concurrent
//!   insert surfaces as `StoreError::Conflict` rather than a generic error
//! - Updates of a record only apply while it is unverified, so a verified
//!   record is never rewritten
//! - Both traits are object-safe so services take `Arc<dyn ...>` and tests
//!   substitute in-memory implementations

mod donations;
mod ledger;
pub mod models;

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use thiserror::Error;

use crate::config::DatabaseConfig;
pub use models::{
    Donation, NewDonation, PaymentStatus, VerificationRecord, VerificationState, VerificationWrite,
};

/// Errors raised by the donation store and verification ledger.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The donation already has a verification record.
    #[error("verification record for donation {0} already exists")]
    Conflict(i64),

    /// A row expected to exist was not found.
    #[error("{0} not found")]
    Missing(String),

    /// A payment status change that the lifecycle does not allow.
    #[error("donation {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: i64,
        from: PaymentStatus,
        to: PaymentStatus,
    },

    /// A stored value could not be mapped back to a model.
    #[error("corrupt row: {0}")]
    Corrupt(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Aggregate counts over the verification ledger.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LedgerCounts {
    pub verified: i64,
    pub unverified: i64,
}

/// Donation rows. Owned by the payment flow.
#[async_trait]
pub trait DonationStore: Send + Sync {
    async fn get_donation(&self, id: i64) -> StoreResult<Option<Donation>>;

    /// Record a payment intent with status PENDING.
    async fn create_donation(&self, new: &NewDonation) -> StoreResult<Donation>;

    /// Move PENDING → SUCCEEDED. Already-succeeded donations are returned
    /// unchanged; FAILED and REFUNDED are rejected.
    async fn mark_succeeded(&self, id: i64) -> StoreResult<Donation>;

    async fn count_successful(&self) -> StoreResult<i64>;

    /// SUCCEEDED donations without a verified record, oldest first.
    async fn list_unverified(&self, limit: u32) -> StoreResult<Vec<Donation>>;
}

/// Verification records. Owned by the verification service.
#[async_trait]
pub trait VerificationLedger: Send + Sync {
    async fn find_by_donation(&self, donation_id: i64) -> StoreResult<Option<VerificationRecord>>;

    /// Create the record for `donation_id`; `StoreError::Conflict` if one exists.
    async fn insert(&self, donation_id: i64, write: &VerificationWrite)
        -> StoreResult<VerificationRecord>;

    /// Rewrite record `record_id` in place if it is still unverified.
    /// Returns `None` when the record has been verified meanwhile.
    async fn update_unverified(
        &self,
        record_id: i64,
        write: &VerificationWrite,
    ) -> StoreResult<Option<VerificationRecord>>;

    /// Records in `state`, least recently stamped first. `None` lists all.
    async fn list_by_state(
        &self,
        state: VerificationState,
        limit: Option<u32>,
    ) -> StoreResult<Vec<VerificationRecord>>;

    async fn count_by_verified(&self) -> StoreResult<LedgerCounts>;
}

/// SQLite-backed store implementing both repository traits.
#[derive(Clone, Debug)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open the pool described by `config`.
    ///
    /// In-memory databases are pinned to a single connection that never
    /// expires, since every SQLite connection gets its own memory database.
    pub async fn connect(config: &DatabaseConfig) -> StoreResult<Self> {
        let in_memory = config.url.contains(":memory:");

        let mut options = SqliteConnectOptions::from_str(&config.url)?
            .create_if_missing(true)
            .foreign_keys(true);
        if !in_memory {
            options = options.journal_mode(SqliteJournalMode::Wal);
        }

        let mut pool_options = SqlitePoolOptions::new()
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs));
        pool_options = if in_memory {
            pool_options
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            pool_options.max_connections(config.max_connections)
        };

        let pool = pool_options.connect_with(options).await?;

        tracing::info!(url = %config.url, in_memory, "Database connected");
        Ok(Self { pool })
    }

    /// In-memory database with migrations applied.
    pub async fn in_memory() -> StoreResult<Self> {
        let config = DatabaseConfig {
            url: "sqlite::memory:".to_string(),
            ..DatabaseConfig::default()
        };
        let db = Self::connect(&config).await?;
        db.run_migrations().await?;
        Ok(db)
    }

    /// Apply embedded migrations.
    pub async fn run_migrations(&self) -> StoreResult<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Health check
    pub async fn health_check(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

//! Background retry of unverified donations.
//!
//! # Responsibilities
//! - Periodically re-submit FAILED records
//! - Submit QUEUED records left by deferred confirmation
//!
//! # Design Decisions
//! - Missed ticks are skipped, so a slow sweep never causes a burst
//! - Overlap with request-driven verification is harmless because
//!   `verify_donation` is a no-op on verified records

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::{self, MissedTickBehavior};

use crate::config::VerificationConfig;
use crate::verification::orchestrator::VerificationService;
use crate::verification::types::RetrySummary;

pub struct VerificationSweeper {
    service: Arc<VerificationService>,
    interval: Duration,
    limit: u32,
}

impl VerificationSweeper {
    pub fn new(service: Arc<VerificationService>, config: &VerificationConfig) -> Self {
        Self {
            service,
            interval: Duration::from_secs(config.sweep_interval_secs),
            limit: config.sweep_limit,
        }
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(
            interval_secs = self.interval.as_secs(),
            limit = self.limit,
            "Verification sweeper starting"
        );

        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.sweep_once().await;
                }
                _ = shutdown.recv() => {
                    tracing::info!("Verification sweeper received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    /// One pass over failed then queued records.
    pub async fn sweep_once(&self) -> (RetrySummary, RetrySummary) {
        let failed = match self.service.retry_failed_verifications(Some(self.limit)).await {
            Ok(summary) => summary,
            Err(e) => {
                tracing::error!(error = %e, "Retry sweep could not list failed records");
                RetrySummary::default()
            }
        };
        let queued = match self.service.process_queued_verifications(self.limit).await {
            Ok(summary) => summary,
            Err(e) => {
                tracing::error!(error = %e, "Queue sweep could not list queued records");
                RetrySummary::default()
            }
        };
        (failed, queued)
    }
}

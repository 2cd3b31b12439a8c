//! Reconciles successful payments with the on-chain donation ledger.
//!
//! Per-donation state machine:
//! ```text
//! UNSEEN  --chain ok-->            VERIFIED
//! UNSEEN  --chain fails-->         PENDING (failed_ placeholder)
//! UNSEEN  --enqueue-->             PENDING (pending_ placeholder)
//! PENDING --chain ok-->            VERIFIED   (same record, updated in place)
//! PENDING --chain fails-->         PENDING    (re-stamped)
//! VERIFIED --anything-->           VERIFIED
//! ```

use std::sync::Arc;
use std::time::Instant;

use crate::blockchain::{ChainClient, ChainDonation};
use crate::db::{
    Donation, DonationStore, StoreError, StoreResult, VerificationLedger, VerificationRecord,
    VerificationState, VerificationWrite,
};
use crate::observability::metrics;
use crate::verification::types::{
    BatchOutcome, RetrySummary, VerificationError, VerificationResult, VerificationStats,
    VerificationStatus,
};

/// Verification orchestrator. Sole writer of verification records.
pub struct VerificationService {
    donations: Arc<dyn DonationStore>,
    ledger: Arc<dyn VerificationLedger>,
    chain: Arc<dyn ChainClient>,
}

impl VerificationService {
    pub fn new(
        donations: Arc<dyn DonationStore>,
        ledger: Arc<dyn VerificationLedger>,
        chain: Arc<dyn ChainClient>,
    ) -> Self {
        Self {
            donations,
            ledger,
            chain,
        }
    }

    /// Submit a donation to the chain and record the outcome.
    ///
    /// Returns the existing record untouched if the donation is already
    /// verified. A chain failure is recorded as a `failed_` placeholder and
    /// returned as success; only if that write fails too is the chain error
    /// returned.
    pub async fn verify_donation(&self, donation_id: i64) -> VerificationResult<VerificationRecord> {
        let result = self.verify(donation_id).await;
        if result.is_err() {
            metrics::record_verification("error");
        }
        result
    }

    async fn verify(&self, donation_id: i64) -> VerificationResult<VerificationRecord> {
        let donation = self.load_donation(donation_id).await?;
        let existing = self.ledger.find_by_donation(donation_id).await?;

        if let Some(record) = existing.as_ref().filter(|r| r.verified) {
            tracing::debug!(donation_id, record_id = record.id, "Donation already verified");
            metrics::record_verification("already_verified");
            return Ok(record.clone());
        }

        let submission = ChainDonation::from(&donation);
        let start = Instant::now();
        match self.chain.record_donation(&submission).await {
            Ok(receipt) => {
                metrics::record_chain_submission(true, start);
                tracing::info!(
                    donation_id,
                    tx_hash = %receipt.transaction_hash,
                    block_number = receipt.block_number,
                    gas_used = %receipt.gas_used,
                    chain_donation_id = ?receipt.chain_donation_id,
                    "Donation recorded on chain"
                );

                let write = VerificationWrite::confirmed(
                    receipt.transaction_hash.clone(),
                    receipt.block_number,
                );
                let record = self
                    .persist(donation_id, existing, &write)
                    .await
                    .map_err(|e| {
                        tracing::error!(
                            donation_id,
                            tx_hash = %receipt.transaction_hash,
                            error = %e,
                            "Chain transaction mined but verification record not saved"
                        );
                        VerificationError::LedgerWrite(e)
                    })?;
                metrics::record_verification("verified");
                Ok(record)
            }
            Err(chain_error) => {
                metrics::record_chain_submission(false, start);
                tracing::warn!(
                    donation_id,
                    error = %chain_error,
                    "Chain submission failed, recording placeholder"
                );

                let write = VerificationWrite::placeholder(donation_id, VerificationState::Failed);
                match self.persist(donation_id, existing, &write).await {
                    Ok(record) => {
                        metrics::record_verification("pending");
                        Ok(record)
                    }
                    Err(store_error) => {
                        tracing::error!(
                            donation_id,
                            chain_error = %chain_error,
                            store_error = %store_error,
                            "Failed to record chain failure"
                        );
                        Err(VerificationError::ChainSubmission(chain_error))
                    }
                }
            }
        }
    }

    /// Write `write` as the donation's single record.
    ///
    /// A lost insert race re-reads the winner: a verified winner is kept,
    /// a confirmed write upgrades an unverified winner, and a placeholder
    /// write leaves the winner as it is.
    async fn persist(
        &self,
        donation_id: i64,
        existing: Option<VerificationRecord>,
        write: &VerificationWrite,
    ) -> StoreResult<VerificationRecord> {
        let current = match existing {
            Some(record) => record,
            None => match self.ledger.insert(donation_id, write).await {
                Ok(record) => return Ok(record),
                Err(StoreError::Conflict(_)) => {
                    tracing::debug!(donation_id, "Concurrent verification created the record first");
                    let winner = self.reload(donation_id).await?;
                    if winner.verified || !write.is_verified() {
                        return Ok(winner);
                    }
                    winner
                }
                Err(e) => return Err(e),
            },
        };

        if current.verified {
            return Ok(current);
        }

        match self.ledger.update_unverified(current.id, write).await? {
            Some(updated) => Ok(updated),
            // Verified by a concurrent call between our read and write.
            None => self.reload(donation_id).await,
        }
    }

    async fn reload(&self, donation_id: i64) -> StoreResult<VerificationRecord> {
        self.ledger
            .find_by_donation(donation_id)
            .await?
            .ok_or_else(|| StoreError::Missing(format!("verification record for donation {}", donation_id)))
    }

    async fn load_donation(&self, donation_id: i64) -> VerificationResult<Donation> {
        self.donations
            .get_donation(donation_id)
            .await?
            .ok_or(VerificationError::NotFound(donation_id))
    }

    /// Verify each id in order. Failures are reported per item and never
    /// abort the batch.
    pub async fn batch_verify_donations(&self, donation_ids: &[i64]) -> Vec<BatchOutcome> {
        let mut outcomes = Vec::with_capacity(donation_ids.len());
        for &donation_id in donation_ids {
            let outcome = match self.verify_donation(donation_id).await {
                Ok(record) => BatchOutcome {
                    donation_id,
                    success: true,
                    result: Some(record),
                    error: None,
                },
                Err(e) => BatchOutcome {
                    donation_id,
                    success: false,
                    result: None,
                    error: Some(e.to_string()),
                },
            };
            outcomes.push(outcome);
        }

        let succeeded = outcomes.iter().filter(|o| o.success).count();
        tracing::info!(
            total = outcomes.len(),
            succeeded,
            failed = outcomes.len() - succeeded,
            "Batch verification finished"
        );
        outcomes
    }

    /// Re-attempt records whose last submission failed, oldest first.
    /// `None` retries every one of them; the sweeper passes its page size.
    pub async fn retry_failed_verifications(
        &self,
        limit: Option<u32>,
    ) -> VerificationResult<RetrySummary> {
        self.sweep(VerificationState::Failed, limit).await
    }

    /// Submit up to `limit` records queued by deferred confirmation.
    pub async fn process_queued_verifications(&self, limit: u32) -> VerificationResult<RetrySummary> {
        self.sweep(VerificationState::Queued, Some(limit)).await
    }

    async fn sweep(
        &self,
        state: VerificationState,
        limit: Option<u32>,
    ) -> VerificationResult<RetrySummary> {
        let records = self.ledger.list_by_state(state, limit).await?;
        let mut summary = RetrySummary::default();

        for record in records {
            summary.retried += 1;
            match self.verify_donation(record.donation_id).await {
                Ok(updated) if updated.verified => {
                    summary.successful += 1;
                    metrics::record_sweep_item("verified");
                }
                Ok(_) => {
                    summary.failed += 1;
                    metrics::record_sweep_item("still_pending");
                }
                Err(e) => {
                    summary.failed += 1;
                    metrics::record_sweep_item("error");
                    tracing::warn!(
                        donation_id = record.donation_id,
                        error = %e,
                        "Sweep verification failed"
                    );
                }
            }
        }

        if summary.retried > 0 {
            tracing::info!(
                state = %state,
                retried = summary.retried,
                successful = summary.successful,
                failed = summary.failed,
                "Verification sweep finished"
            );
        }
        Ok(summary)
    }

    /// Mark a donation for later submission without calling the chain.
    /// An existing record of any state is returned as is.
    pub async fn enqueue_verification(&self, donation_id: i64) -> VerificationResult<VerificationRecord> {
        self.load_donation(donation_id).await?;
        if let Some(record) = self.ledger.find_by_donation(donation_id).await? {
            return Ok(record);
        }

        let write = VerificationWrite::placeholder(donation_id, VerificationState::Queued);
        let record = self
            .persist(donation_id, None, &write)
            .await
            .map_err(VerificationError::LedgerWrite)?;
        tracing::info!(donation_id, record_id = record.id, "Donation queued for verification");
        Ok(record)
    }

    pub async fn get_verification_status(
        &self,
        donation_id: i64,
    ) -> VerificationResult<VerificationStatus> {
        self.load_donation(donation_id).await?;
        let record = self.ledger.find_by_donation(donation_id).await?;
        Ok(VerificationStatus::from_record(donation_id, record.as_ref()))
    }

    pub async fn get_verification_stats(&self) -> VerificationResult<VerificationStats> {
        let total = self.donations.count_successful().await?;
        let counts = self.ledger.count_by_verified().await?;
        Ok(VerificationStats::new(total, counts.verified, counts.unverified))
    }

    /// Successful donations that still lack a verified record.
    pub async fn unverified_donations(&self, limit: u32) -> VerificationResult<Vec<Donation>> {
        Ok(self.donations.list_unverified(limit).await?)
    }
}

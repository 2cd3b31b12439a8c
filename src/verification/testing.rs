//! In-memory collaborators for exercising the verification service.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Barrier;

use crate::blockchain::{
    ChainClient, ChainDonation, ChainError, ChainReceipt, ChainResult, CharityFlow,
    OnChainDonation,
};
use crate::db::{
    Donation, DonationStore, LedgerCounts, NewDonation, PaymentStatus, StoreError, StoreResult,
    VerificationLedger, VerificationRecord, VerificationState, VerificationWrite,
};

#[derive(Default)]
struct StoreInner {
    donations: HashMap<i64, Donation>,
    /// Keyed by donation id, mirroring the unique constraint.
    records: HashMap<i64, VerificationRecord>,
    next_record_id: i64,
    failing_writes: HashSet<i64>,
}

/// Donation store and ledger backed by hash maps.
#[derive(Default)]
pub(crate) struct MemoryStore {
    inner: Mutex<StoreInner>,
}

impl MemoryStore {
    pub fn add_donation(&self, id: i64, status: PaymentStatus) -> Donation {
        let donation = Donation {
            id,
            amount_cents: 1000 + id,
            currency: "usd".to_string(),
            transaction_id: format!("txn_{}", id),
            payment_status: status,
            donor_id: format!("donor_{}", id),
            charity_id: "charity_1".to_string(),
            project_id: None,
            anonymous: false,
            created_at: Utc::now(),
        };
        self.inner.lock().unwrap().donations.insert(id, donation.clone());
        donation
    }

    /// Make every ledger write for `donation_id` fail.
    pub fn fail_writes_for(&self, donation_id: i64) {
        self.inner.lock().unwrap().failing_writes.insert(donation_id);
    }

    pub fn record(&self, donation_id: i64) -> Option<VerificationRecord> {
        self.inner.lock().unwrap().records.get(&donation_id).cloned()
    }

    pub fn record_count(&self) -> usize {
        self.inner.lock().unwrap().records.len()
    }
}

fn write_failure() -> StoreError {
    StoreError::Database(sqlx::Error::PoolTimedOut)
}

#[async_trait]
impl DonationStore for MemoryStore {
    async fn get_donation(&self, id: i64) -> StoreResult<Option<Donation>> {
        Ok(self.inner.lock().unwrap().donations.get(&id).cloned())
    }

    async fn create_donation(&self, new: &NewDonation) -> StoreResult<Donation> {
        let mut inner = self.inner.lock().unwrap();
        let id = inner.donations.keys().max().copied().unwrap_or(0) + 1;
        let donation = Donation {
            id,
            amount_cents: new.amount_cents,
            currency: new.currency.to_lowercase(),
            transaction_id: format!("txn_{}", id),
            payment_status: PaymentStatus::Pending,
            donor_id: new.donor_id.clone(),
            charity_id: new.charity_id.clone(),
            project_id: new.project_id.clone(),
            anonymous: new.anonymous,
            created_at: Utc::now(),
        };
        inner.donations.insert(id, donation.clone());
        Ok(donation)
    }

    async fn mark_succeeded(&self, id: i64) -> StoreResult<Donation> {
        let mut inner = self.inner.lock().unwrap();
        let donation = inner
            .donations
            .get_mut(&id)
            .ok_or_else(|| StoreError::Missing(format!("donation {}", id)))?;
        match donation.payment_status {
            PaymentStatus::Pending | PaymentStatus::Succeeded => {
                donation.payment_status = PaymentStatus::Succeeded;
                Ok(donation.clone())
            }
            from => Err(StoreError::InvalidTransition {
                id,
                from,
                to: PaymentStatus::Succeeded,
            }),
        }
    }

    async fn count_successful(&self) -> StoreResult<i64> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .donations
            .values()
            .filter(|d| d.payment_status == PaymentStatus::Succeeded)
            .count() as i64)
    }

    async fn list_unverified(&self, limit: u32) -> StoreResult<Vec<Donation>> {
        let inner = self.inner.lock().unwrap();
        let mut unverified: Vec<Donation> = inner
            .donations
            .values()
            .filter(|d| d.payment_status == PaymentStatus::Succeeded)
            .filter(|d| !inner.records.get(&d.id).is_some_and(|r| r.verified))
            .cloned()
            .collect();
        unverified.sort_by_key(|d| (d.created_at, d.id));
        unverified.truncate(limit as usize);
        Ok(unverified)
    }
}

#[async_trait]
impl VerificationLedger for MemoryStore {
    async fn find_by_donation(&self, donation_id: i64) -> StoreResult<Option<VerificationRecord>> {
        Ok(self.record(donation_id))
    }

    async fn insert(
        &self,
        donation_id: i64,
        write: &VerificationWrite,
    ) -> StoreResult<VerificationRecord> {
        let mut inner = self.inner.lock().unwrap();
        if inner.failing_writes.contains(&donation_id) {
            return Err(write_failure());
        }
        if inner.records.contains_key(&donation_id) {
            return Err(StoreError::Conflict(donation_id));
        }
        inner.next_record_id += 1;
        let record = VerificationRecord {
            id: inner.next_record_id,
            donation_id,
            state: write.state,
            transaction_hash: write.transaction_hash.clone(),
            block_number: write.block_number,
            timestamp: write.timestamp,
            verified: write.is_verified(),
        };
        inner.records.insert(donation_id, record.clone());
        Ok(record)
    }

    async fn update_unverified(
        &self,
        record_id: i64,
        write: &VerificationWrite,
    ) -> StoreResult<Option<VerificationRecord>> {
        let mut inner = self.inner.lock().unwrap();
        let donation_id = inner
            .records
            .values()
            .find(|r| r.id == record_id)
            .map(|r| r.donation_id)
            .ok_or_else(|| StoreError::Missing(format!("verification record {}", record_id)))?;
        if inner.failing_writes.contains(&donation_id) {
            return Err(write_failure());
        }
        let record = inner
            .records
            .get_mut(&donation_id)
            .ok_or_else(|| StoreError::Missing(format!("verification record {}", record_id)))?;
        if record.verified {
            return Ok(None);
        }
        record.state = write.state;
        record.transaction_hash = write.transaction_hash.clone();
        record.block_number = write.block_number;
        record.timestamp = write.timestamp;
        record.verified = write.is_verified();
        Ok(Some(record.clone()))
    }

    async fn list_by_state(
        &self,
        state: VerificationState,
        limit: Option<u32>,
    ) -> StoreResult<Vec<VerificationRecord>> {
        let inner = self.inner.lock().unwrap();
        let mut records: Vec<VerificationRecord> = inner
            .records
            .values()
            .filter(|r| r.state == state)
            .cloned()
            .collect();
        records.sort_by_key(|r| (r.timestamp, r.id));
        if let Some(limit) = limit {
            records.truncate(limit as usize);
        }
        Ok(records)
    }

    async fn count_by_verified(&self) -> StoreResult<LedgerCounts> {
        let inner = self.inner.lock().unwrap();
        let verified = inner.records.values().filter(|r| r.verified).count() as i64;
        Ok(LedgerCounts {
            verified,
            unverified: inner.records.len() as i64 - verified,
        })
    }
}

/// Chain client whose answers are scripted per call.
///
/// Queued outcomes are consumed first; afterwards every call succeeds with a
/// receipt derived from the call number, unless the donation's transaction
/// id was marked failing.
#[derive(Default)]
pub(crate) struct ScriptedChain {
    script: Mutex<VecDeque<ChainResult<ChainReceipt>>>,
    failing_transactions: Mutex<HashSet<String>>,
    calls: AtomicUsize,
    gate: Option<Arc<Barrier>>,
}

impl ScriptedChain {
    /// Every submission waits on `gate` before answering.
    pub fn gated(gate: Arc<Barrier>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::default()
        }
    }

    pub fn push_ok(&self, transaction_hash: &str, block_number: u64, gas_used: &str) {
        self.script.lock().unwrap().push_back(Ok(ChainReceipt {
            transaction_hash: transaction_hash.to_string(),
            block_number,
            gas_used: gas_used.to_string(),
            chain_donation_id: None,
        }));
    }

    pub fn push_err(&self, message: &str) {
        self.script
            .lock()
            .unwrap()
            .push_back(Err(ChainError::Rpc(message.to_string())));
    }

    pub fn fail_transaction(&self, transaction_id: &str) {
        self.failing_transactions
            .lock()
            .unwrap()
            .insert(transaction_id.to_string());
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChainClient for ScriptedChain {
    async fn record_donation(&self, donation: &ChainDonation) -> ChainResult<ChainReceipt> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) as u64 + 1;
        if let Some(gate) = &self.gate {
            gate.wait().await;
        }
        if self
            .failing_transactions
            .lock()
            .unwrap()
            .contains(&donation.transaction_id)
        {
            return Err(ChainError::Rpc("connection refused".to_string()));
        }
        if let Some(outcome) = self.script.lock().unwrap().pop_front() {
            return outcome;
        }
        Ok(ChainReceipt {
            transaction_hash: format!("0x{:064x}", call),
            block_number: 1000 + call,
            gas_used: "21000".to_string(),
            chain_donation_id: Some(call.to_string()),
        })
    }

    async fn get_donation(&self, chain_donation_id: u64) -> ChainResult<OnChainDonation> {
        Err(ChainError::Reverted(format!("donation {} does not exist", chain_donation_id)))
    }

    async fn get_donations_by_charity(&self, _charity_id: &str) -> ChainResult<Vec<String>> {
        Ok(Vec::new())
    }

    async fn get_charity_flow(&self, charity_id: &str) -> ChainResult<CharityFlow> {
        Ok(CharityFlow {
            charity_id: charity_id.to_string(),
            received: "0".to_string(),
            disbursed: "0".to_string(),
            balance: "0".to_string(),
        })
    }

    async fn is_healthy(&self) -> bool {
        true
    }
}

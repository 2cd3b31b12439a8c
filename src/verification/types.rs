//! Verification results, errors and reporting types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::blockchain::ChainError;
use crate::db::{StoreError, VerificationRecord, VerificationState};

/// Errors surfaced by the verification service.
#[derive(Debug, Error)]
pub enum VerificationError {
    /// The donation does not exist. Raised before any side effect.
    #[error("donation {0} not found")]
    NotFound(i64),

    /// The chain call failed and the failure could not be recorded either.
    #[error("chain submission failed: {0}")]
    ChainSubmission(#[source] ChainError),

    /// The chain accepted the donation but the outcome was not persisted.
    #[error("failed to persist verification record: {0}")]
    LedgerWrite(#[source] StoreError),

    /// A read against the donation store or ledger failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type VerificationResult<T> = Result<T, VerificationError>;

/// Reported verification state of a donation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusKind {
    /// No record exists.
    NotVerified,
    /// A record exists but is not backed by a mined transaction.
    Pending,
    Verified,
}

/// Answer to a status query for one donation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationStatus {
    pub donation_id: i64,
    pub status: StatusKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<VerificationState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_number: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl VerificationStatus {
    pub fn from_record(donation_id: i64, record: Option<&VerificationRecord>) -> Self {
        match record {
            None => Self {
                donation_id,
                status: StatusKind::NotVerified,
                state: None,
                transaction_hash: None,
                block_number: None,
                timestamp: None,
            },
            Some(record) => Self {
                donation_id,
                status: if record.verified {
                    StatusKind::Verified
                } else {
                    StatusKind::Pending
                },
                state: Some(record.state),
                transaction_hash: Some(record.transaction_hash.clone()),
                block_number: Some(record.block_number),
                timestamp: Some(record.timestamp),
            },
        }
    }
}

/// Aggregate verification coverage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationStats {
    pub total_successful_donations: i64,
    pub verified: i64,
    pub pending: i64,
    /// Percentage of successful donations with a verified record, two decimals.
    pub verification_rate: f64,
}

impl VerificationStats {
    pub fn new(total_successful_donations: i64, verified: i64, pending: i64) -> Self {
        let verification_rate = if total_successful_donations > 0 {
            let rate = verified as f64 / total_successful_donations as f64 * 100.0;
            (rate * 100.0).round() / 100.0
        } else {
            0.0
        };
        Self {
            total_successful_donations,
            verified,
            pending,
            verification_rate,
        }
    }
}

/// Per-item result of a batch verification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchOutcome {
    pub donation_id: i64,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<VerificationRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Counts from one sweep over unverified records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrySummary {
    pub retried: u32,
    /// Records verified after the attempt.
    pub successful: u32,
    /// Attempts that errored or left the record unverified.
    pub failed: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_rounds_to_two_decimals() {
        let stats = VerificationStats::new(3, 2, 1);
        assert_eq!(stats.verification_rate, 66.67);
    }

    #[test]
    fn test_rate_is_zero_without_donations() {
        let stats = VerificationStats::new(0, 0, 0);
        assert_eq!(stats.verification_rate, 0.0);
    }

    #[test]
    fn test_status_serializes_screaming_snake() {
        let status = VerificationStatus::from_record(7, None);
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["status"], "NOT_VERIFIED");
        assert!(json.get("transaction_hash").is_none());
    }
}

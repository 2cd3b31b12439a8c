//! Database models.
//!
//! Donations are owned by the payment flow; verification records are owned
//! by the verification service and mirror each donation's on-chain outcome.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::db::StoreError;

/// Payment lifecycle of a donation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Succeeded,
    Failed,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Succeeded => "SUCCEEDED",
            PaymentStatus::Failed => "FAILED",
            PaymentStatus::Refunded => "REFUNDED",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(PaymentStatus::Pending),
            "SUCCEEDED" => Ok(PaymentStatus::Succeeded),
            "FAILED" => Ok(PaymentStatus::Failed),
            "REFUNDED" => Ok(PaymentStatus::Refunded),
            other => Err(StoreError::Corrupt(format!("unknown payment status '{}'", other))),
        }
    }
}

/// A donation from a donor to a charity, optionally earmarked for a project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Donation {
    pub id: i64,
    /// Amount in minor currency units; immutable once created.
    pub amount_cents: i64,
    pub currency: String,
    /// Application-level payment reference (distinct from any chain hash).
    pub transaction_id: String,
    pub payment_status: PaymentStatus,
    pub donor_id: String,
    pub charity_id: String,
    pub project_id: Option<String>,
    pub anonymous: bool,
    pub created_at: DateTime<Utc>,
}

/// Fields supplied when a payment intent is created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewDonation {
    pub amount_cents: i64,
    pub currency: String,
    pub donor_id: String,
    pub charity_id: String,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub anonymous: bool,
}

#[derive(Debug, FromRow)]
pub(crate) struct DonationRow {
    pub id: i64,
    pub amount_cents: i64,
    pub currency: String,
    pub transaction_id: String,
    pub payment_status: String,
    pub donor_id: String,
    pub charity_id: String,
    pub project_id: Option<String>,
    pub anonymous: bool,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<DonationRow> for Donation {
    type Error = StoreError;

    fn try_from(row: DonationRow) -> Result<Self, Self::Error> {
        Ok(Donation {
            id: row.id,
            amount_cents: row.amount_cents,
            currency: row.currency,
            transaction_id: row.transaction_id,
            payment_status: row.payment_status.parse()?,
            donor_id: row.donor_id,
            charity_id: row.charity_id,
            project_id: row.project_id,
            anonymous: row.anonymous,
            created_at: row.created_at,
        })
    }
}

/// Where a donation stands with respect to the chain.
///
/// Stored in its own column; the placeholder prefixes on the hash are for
/// human inspection only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerificationState {
    /// Mined on chain; the hash and block number are authoritative. Absorbing.
    Verified,
    /// A submission was attempted and failed; eligible for the retry sweep.
    Failed,
    /// Accepted for verification but not yet submitted.
    Queued,
}

impl VerificationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerificationState::Verified => "VERIFIED",
            VerificationState::Failed => "FAILED",
            VerificationState::Queued => "QUEUED",
        }
    }

    /// Prefix marking a non-authoritative hash, if this state uses one.
    pub fn placeholder_prefix(&self) -> Option<&'static str> {
        match self {
            VerificationState::Verified => None,
            VerificationState::Failed => Some("failed_"),
            VerificationState::Queued => Some("pending_"),
        }
    }
}

impl fmt::Display for VerificationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VerificationState {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "VERIFIED" => Ok(VerificationState::Verified),
            "FAILED" => Ok(VerificationState::Failed),
            "QUEUED" => Ok(VerificationState::Queued),
            other => Err(StoreError::Corrupt(format!("unknown verification state '{}'", other))),
        }
    }
}

/// The single verification record a donation may have.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationRecord {
    pub id: i64,
    pub donation_id: i64,
    pub state: VerificationState,
    pub transaction_hash: String,
    pub block_number: i64,
    pub timestamp: DateTime<Utc>,
    pub verified: bool,
}

#[derive(Debug, FromRow)]
pub(crate) struct VerificationRow {
    pub id: i64,
    pub donation_id: i64,
    pub state: String,
    pub transaction_hash: String,
    pub block_number: i64,
    pub timestamp: DateTime<Utc>,
    pub verified: bool,
}

impl TryFrom<VerificationRow> for VerificationRecord {
    type Error = StoreError;

    fn try_from(row: VerificationRow) -> Result<Self, Self::Error> {
        Ok(VerificationRecord {
            id: row.id,
            donation_id: row.donation_id,
            state: row.state.parse()?,
            transaction_hash: row.transaction_hash,
            block_number: row.block_number,
            timestamp: row.timestamp,
            verified: row.verified,
        })
    }
}

/// Column values written by an insert or in-place update of a record.
#[derive(Debug, Clone, PartialEq)]
pub struct VerificationWrite {
    pub state: VerificationState,
    pub transaction_hash: String,
    pub block_number: i64,
    pub timestamp: DateTime<Utc>,
}

impl VerificationWrite {
    /// A mined transaction.
    pub fn confirmed(transaction_hash: impl Into<String>, block_number: u64) -> Self {
        Self {
            state: VerificationState::Verified,
            transaction_hash: transaction_hash.into(),
            block_number: i64::try_from(block_number).unwrap_or(i64::MAX),
            timestamp: Utc::now(),
        }
    }

    /// A non-authoritative marker for `donation_id`, stamped with the current time.
    pub fn placeholder(donation_id: i64, state: VerificationState) -> Self {
        let timestamp = Utc::now();
        let prefix = state.placeholder_prefix().unwrap_or("placeholder_");
        Self {
            state,
            transaction_hash: format!("{}{}_{}", prefix, donation_id, timestamp.timestamp_millis()),
            block_number: 0,
            timestamp,
        }
    }

    pub fn is_verified(&self) -> bool {
        self.state == VerificationState::Verified
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholder_hashes_are_prefixed() {
        let failed = VerificationWrite::placeholder(42, VerificationState::Failed);
        assert!(failed.transaction_hash.starts_with("failed_42_"));
        assert_eq!(failed.block_number, 0);
        assert!(!failed.is_verified());

        let queued = VerificationWrite::placeholder(42, VerificationState::Queued);
        assert!(queued.transaction_hash.starts_with("pending_42_"));
    }

    #[test]
    fn test_confirmed_write() {
        let write = VerificationWrite::confirmed("0xabc", 100);
        assert!(write.is_verified());
        assert_eq!(write.block_number, 100);
        assert_eq!(write.transaction_hash, "0xabc");
    }

    #[test]
    fn test_state_round_trips_through_column_text() {
        for state in [
            VerificationState::Verified,
            VerificationState::Failed,
            VerificationState::Queued,
        ] {
            assert_eq!(state.as_str().parse::<VerificationState>().unwrap(), state);
        }
        assert!("BOGUS".parse::<VerificationState>().is_err());
        assert_eq!("REFUNDED".parse::<PaymentStatus>().unwrap(), PaymentStatus::Refunded);
    }
}

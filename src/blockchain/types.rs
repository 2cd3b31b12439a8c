//! Chain-specific types and error definitions.

use alloy::primitives::U256;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db::models::Donation;

/// Errors that can occur during blockchain operations.
#[derive(Debug, Error)]
pub enum ChainError {
    /// RPC connection or request failed.
    #[error("RPC error: {0}")]
    Rpc(String),

    /// RPC request timed out.
    #[error("RPC timeout after {0} seconds")]
    Timeout(u64),

    /// Transaction was reverted on-chain.
    #[error("Transaction reverted: {0}")]
    Reverted(String),

    /// Invalid private key format or signing failure.
    #[error("Wallet error: {0}")]
    Wallet(String),

    /// Contract call could not be encoded or its result decoded.
    #[error("Contract error: {0}")]
    Contract(String),

    /// Chain configuration mismatch.
    #[error("Chain ID mismatch: expected {expected}, got {actual}")]
    ChainMismatch { expected: u64, actual: u64 },

    /// Blockchain client not initialized or disabled.
    #[error("Blockchain not available: {0}")]
    NotAvailable(String),

    /// Configuration value could not be used (bad URL, bad address).
    #[error("Invalid blockchain configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for blockchain operations.
pub type ChainResult<T> = Result<T, ChainError>;

/// Public fields of a donation submitted to the ledger contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainDonation {
    pub transaction_id: String,
    pub donor_id: String,
    pub charity_id: String,
    /// Empty string when the donation is not tied to a project.
    pub project_id: String,
    /// Amount in minor currency units.
    pub amount: u64,
    pub currency: String,
    pub anonymous: bool,
}

impl From<&Donation> for ChainDonation {
    fn from(donation: &Donation) -> Self {
        Self {
            transaction_id: donation.transaction_id.clone(),
            donor_id: donation.donor_id.clone(),
            charity_id: donation.charity_id.clone(),
            project_id: donation.project_id.clone().unwrap_or_default(),
            // Store enforces amount_cents > 0.
            amount: donation.amount_cents.max(0) as u64,
            currency: donation.currency.clone(),
            anonymous: donation.anonymous,
        }
    }
}

/// Outcome of a mined `recordDonation` transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainReceipt {
    /// 0x-prefixed transaction hash.
    pub transaction_hash: String,
    pub block_number: u64,
    pub gas_used: String,
    /// Contract-assigned donation id, decoded from the `DonationRecorded` event.
    pub chain_donation_id: Option<String>,
}

/// A donation as stored by the ledger contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnChainDonation {
    pub chain_donation_id: String,
    pub transaction_id: String,
    pub donor_id: String,
    pub charity_id: String,
    pub project_id: Option<String>,
    pub amount: String,
    pub currency: String,
    pub anonymous: bool,
    /// Block timestamp recorded by the contract (seconds since epoch).
    pub recorded_at: u64,
}

/// Charity-level totals tracked by the contract. Values are decimal strings
/// because they are 256-bit on chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharityFlow {
    pub charity_id: String,
    pub received: String,
    pub disbursed: String,
    pub balance: String,
}

impl CharityFlow {
    pub fn from_totals(charity_id: &str, received: U256, disbursed: U256, balance: U256) -> Self {
        Self {
            charity_id: charity_id.to_string(),
            received: received.to_string(),
            disbursed: disbursed.to_string(),
            balance: balance.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::PaymentStatus;
    use chrono::Utc;

    #[test]
    fn test_error_display() {
        let err = ChainError::Timeout(10);
        assert_eq!(err.to_string(), "RPC timeout after 10 seconds");

        let err = ChainError::ChainMismatch {
            expected: 1,
            actual: 5,
        };
        assert!(err.to_string().contains("expected 1"));
    }

    #[test]
    fn test_chain_donation_from_donation() {
        let donation = Donation {
            id: 7,
            amount_cents: 2500,
            currency: "usd".to_string(),
            transaction_id: "txn_7".to_string(),
            payment_status: PaymentStatus::Succeeded,
            donor_id: "donor_1".to_string(),
            charity_id: "charity_9".to_string(),
            project_id: None,
            anonymous: true,
            created_at: Utc::now(),
        };

        let submission = ChainDonation::from(&donation);
        assert_eq!(submission.amount, 2500);
        assert_eq!(submission.project_id, "");
        assert!(submission.anonymous);
        assert_eq!(submission.transaction_id, "txn_7");
    }

    #[test]
    fn test_charity_flow_from_totals() {
        let flow = CharityFlow::from_totals("c1", U256::from(500), U256::from(200), U256::from(300));
        assert_eq!(flow.received, "500");
        assert_eq!(flow.balance, "300");
    }
}

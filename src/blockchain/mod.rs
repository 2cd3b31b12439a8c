//! Blockchain integration subsystem.
//!
//! # Data Flow
//! ```text
//! Environment Variables (private key)
//!     → wallet.rs (key loading, signing)
//!     → contract.rs (DonationLedger ABI)
//!     → client.rs (submit + confirm, failover reads with timeouts)
//! ```
//!
//! # Security Constraints
//! - Private keys ONLY from environment variables
//! - Never log private keys or sensitive data
//! - All RPC calls have configurable timeouts
//! - Graceful degradation when blockchain unreachable

pub mod client;
pub mod contract;
pub mod types;
pub mod wallet;

pub use client::{ChainClient, ContractClient, DisabledChain};
pub use types::{ChainDonation, ChainError, ChainReceipt, ChainResult, CharityFlow, OnChainDonation};
pub use wallet::Wallet;

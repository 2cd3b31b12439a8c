//! Verification pipeline.
//!
//! # Data Flow
//! ```text
//! confirm payment / admin / sweeper
//!     → orchestrator.rs (load donation, submit, reconcile record)
//!         → ChainClient (submit + wait for mining)
//!         → VerificationLedger (one record per donation)
//! sweeper.rs re-runs the orchestrator for FAILED and QUEUED records
//! ```

pub mod orchestrator;
pub mod sweeper;
#[cfg(test)]
pub(crate) mod testing;
pub mod types;

pub use orchestrator::VerificationService;
pub use sweeper::VerificationSweeper;
pub use types::{
    BatchOutcome, RetrySummary, StatusKind, VerificationError, VerificationResult,
    VerificationStats, VerificationStatus,
};

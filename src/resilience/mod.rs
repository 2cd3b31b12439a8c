//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Chain submission:
//!     → retries.rs (classify error, decide whether to retry)
//!     → backoff.rs (exponential delay with jitter between attempts)
//! ```
//!
//! Per-call deadlines are enforced inside the chain client with
//! `tokio::time::timeout`.

pub mod backoff;
pub mod retries;

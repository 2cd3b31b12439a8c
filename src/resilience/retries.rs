//! Retry logic for chain submissions.
//!
//! # Responsibilities
//! - Decide whether a chain error is transient
//! - Execute retries with exponential backoff + jitter
//!
//! # Design Decisions
//! - Only send-phase RPC failures and timeouts are retried
//! - Reverts, wallet and configuration errors fail immediately

use std::future::Future;

use crate::blockchain::types::{ChainError, ChainResult};
use crate::config::RetryConfig;
use crate::resilience::backoff::calculate_backoff;

/// Whether an error may succeed on a later attempt.
pub fn is_retryable(error: &ChainError) -> bool {
    matches!(error, ChainError::Rpc(_) | ChainError::Timeout(_))
}

/// Run `op` until it succeeds, fails with a non-retryable error, or the
/// attempt budget from `config` is exhausted.
pub async fn retry_with_backoff<T, F, Fut>(
    config: &RetryConfig,
    operation: &'static str,
    mut op: F,
) -> ChainResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ChainResult<T>>,
{
    let max_attempts = if config.enabled { config.max_attempts.max(1) } else { 1 };
    let mut attempt = 0;

    loop {
        attempt += 1;
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < max_attempts && is_retryable(&e) => {
                let delay = calculate_backoff(attempt, config.base_delay_ms, config.max_delay_ms);
                tracing::warn!(
                    operation,
                    attempt,
                    delay = ?delay,
                    error = %e,
                    "Transient chain error, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}

//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, addresses parse)
//! - Check the chain section only when the chain is enabled
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: CharitraceConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

use alloy::primitives::Address;

use crate::config::schema::{CharitraceConfig, PLACEHOLDER_API_KEY};

/// A single semantic problem with a configuration value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field (e.g. `blockchain.rpc_url`).
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Longest one chain submission can take: every send attempt timing out,
/// the maximum backoff (jitter included) between attempts, then the full
/// receipt wait.
pub fn chain_submission_budget(config: &CharitraceConfig) -> Duration {
    let chain = &config.blockchain;
    let retries = &config.retries;
    let attempts = if retries.enabled { retries.max_attempts.max(1) } else { 1 };

    let sends = Duration::from_secs(chain.rpc_timeout_secs.saturating_mul(u64::from(attempts)));
    let backoff_ms: u64 = (1..attempts)
        .map(|attempt| {
            let factor = 1u64.checked_shl(attempt - 1).unwrap_or(u64::MAX);
            let delay = retries.base_delay_ms.saturating_mul(factor).min(retries.max_delay_ms);
            delay + delay / 10
        })
        .fold(0, u64::saturating_add);

    sends + Duration::from_millis(backoff_ms) + Duration::from_secs(chain.receipt_timeout_secs)
}

/// Validate a parsed configuration, collecting every problem found.
pub fn validate_config(config: &CharitraceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.server.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "server.bind_address",
            format!("'{}' is not a socket address", config.server.bind_address),
        ));
    }
    if config.server.request_timeout_secs == 0 {
        errors.push(ValidationError::new("server.request_timeout_secs", "must be greater than 0"));
    }
    if config.server.max_body_size == 0 {
        errors.push(ValidationError::new("server.max_body_size", "must be greater than 0"));
    }

    if config.database.url.trim().is_empty() {
        errors.push(ValidationError::new("database.url", "must not be empty"));
    }
    if config.database.max_connections == 0 {
        errors.push(ValidationError::new("database.max_connections", "must be greater than 0"));
    }

    let chain = &config.blockchain;
    if chain.enabled {
        if url::Url::parse(&chain.rpc_url).is_err() {
            errors.push(ValidationError::new(
                "blockchain.rpc_url",
                format!("'{}' is not a valid URL", chain.rpc_url),
            ));
        }
        if chain.contract_address.parse::<Address>().is_err() {
            errors.push(ValidationError::new(
                "blockchain.contract_address",
                "must be a 20-byte hex address",
            ));
        }
        if chain.rpc_timeout_secs == 0 {
            errors.push(ValidationError::new("blockchain.rpc_timeout_secs", "must be greater than 0"));
        }
        if chain.receipt_timeout_secs == 0 {
            errors.push(ValidationError::new(
                "blockchain.receipt_timeout_secs",
                "must be greater than 0",
            ));
        }

        let budget = chain_submission_budget(config);
        if Duration::from_secs(config.server.request_timeout_secs) <= budget {
            errors.push(ValidationError::new(
                "server.request_timeout_secs",
                format!(
                    "must exceed the worst-case chain submission time of {:.1}s",
                    budget.as_secs_f64()
                ),
            ));
        }
    }

    let verification = &config.verification;
    if verification.sweep_enabled && verification.sweep_interval_secs == 0 {
        errors.push(ValidationError::new(
            "verification.sweep_interval_secs",
            "must be greater than 0 when the sweep is enabled",
        ));
    }
    if verification.sweep_limit == 0 {
        errors.push(ValidationError::new("verification.sweep_limit", "must be greater than 0"));
    }
    if verification.max_batch_size == 0 {
        errors.push(ValidationError::new("verification.max_batch_size", "must be greater than 0"));
    }

    if config.retries.max_attempts == 0 {
        errors.push(ValidationError::new("retries.max_attempts", "must be at least 1"));
    }
    if config.retries.base_delay_ms > config.retries.max_delay_ms {
        errors.push(ValidationError::new(
            "retries.base_delay_ms",
            "must not exceed retries.max_delay_ms",
        ));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", config.observability.metrics_address),
        ));
    }

    if config.admin.enabled
        && (config.admin.api_key.is_empty() || config.admin.api_key == PLACEHOLDER_API_KEY)
    {
        errors.push(ValidationError::new(
            "admin.api_key",
            "must be set to a non-placeholder value when admin is enabled",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> CharitraceConfig {
        let mut config = CharitraceConfig::default();
        config.admin.api_key = "s3cret".to_string();
        config
    }

    #[test]
    fn test_defaults_with_real_key_are_valid() {
        assert!(validate_config(&valid_config()).is_ok());
    }

    #[test]
    fn test_placeholder_admin_key_rejected() {
        let config = CharitraceConfig::default();
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "admin.api_key");
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = valid_config();
        config.server.bind_address = "not-an-address".to_string();
        config.retries.max_attempts = 0;
        config.blockchain.enabled = true;
        config.blockchain.contract_address = "0x1234".to_string();

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
        assert!(fields.contains(&"server.bind_address"));
        assert!(fields.contains(&"retries.max_attempts"));
        assert!(fields.contains(&"blockchain.contract_address"));
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn test_submission_budget_from_defaults() {
        // 3 sends of 10s, backoff of 550ms and 1100ms, 90s receipt wait.
        let budget = chain_submission_budget(&valid_config());
        assert_eq!(budget, Duration::from_millis(121_650));
    }

    #[test]
    fn test_request_timeout_must_cover_inline_submission() {
        let mut config = valid_config();
        config.blockchain.enabled = true;
        config.blockchain.contract_address =
            "0x5FbDB2315678afecb367f032d93F642f64180aa3".to_string();
        assert!(validate_config(&config).is_ok());

        config.server.request_timeout_secs = 120;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "server.request_timeout_secs");

        config.retries.enabled = false;
        config.blockchain.receipt_timeout_secs = 30;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_chain_section_ignored_when_disabled() {
        let mut config = valid_config();
        config.blockchain.enabled = false;
        config.blockchain.contract_address = "garbage".to_string();
        assert!(validate_config(&config).is_ok());
    }
}

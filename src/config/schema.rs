//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the service.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the Charitrace service.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct CharitraceConfig {
    /// HTTP listener settings.
    pub server: ServerConfig,

    /// Relational store holding donations and verification records.
    pub database: DatabaseConfig,

    /// Blockchain integration settings.
    pub blockchain: BlockchainConfig,

    /// Verification pipeline behaviour.
    pub verification: VerificationConfig,

    /// Retry policy for chain submissions.
    pub retries: RetryConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    #[serde(default)]
    pub admin: AdminConfig,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Request timeout in seconds. Inline verification waits for mining,
    /// so with the chain enabled this must exceed the worst-case submission
    /// time (send attempts, backoff and receipt wait).
    pub request_timeout_secs: u64,

    /// Maximum request body size in bytes.
    pub max_body_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            request_timeout_secs: 150,
            max_body_size: 256 * 1024,
        }
    }
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLx connection string (e.g., "sqlite://charitrace.db").
    pub url: String,

    /// Maximum pooled connections.
    pub max_connections: u32,

    /// Connection acquire timeout in seconds.
    pub acquire_timeout_secs: u64,

    /// Apply embedded migrations at startup.
    pub run_migrations: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://charitrace.db".to_string(),
            max_connections: 10,
            acquire_timeout_secs: 3,
            run_migrations: true,
        }
    }
}

/// Blockchain integration configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BlockchainConfig {
    /// Enable blockchain integration. When disabled every verification
    /// lands in the retryable pending state.
    pub enabled: bool,

    /// JSON-RPC endpoint URL used for submissions and reads.
    pub rpc_url: String,

    /// Additional JSON-RPC endpoints used for read-only queries.
    #[serde(default)]
    pub failover_urls: Vec<String>,

    /// Chain ID (e.g., 1 for Ethereum mainnet, 31337 for local Anvil).
    pub chain_id: u64,

    /// Address of the deployed donation ledger contract.
    pub contract_address: String,

    /// RPC request timeout in seconds.
    pub rpc_timeout_secs: u64,

    /// Number of block confirmations required before a donation counts as verified.
    pub confirmation_blocks: u32,

    /// Maximum time to wait for a submitted transaction to be mined, in seconds.
    pub receipt_timeout_secs: u64,
}

impl Default for BlockchainConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            rpc_url: "http://localhost:8545".to_string(),
            failover_urls: Vec::new(),
            chain_id: 31337,
            contract_address: String::new(),
            rpc_timeout_secs: 10,
            confirmation_blocks: 1,
            receipt_timeout_secs: 90,
        }
    }
}

/// How the payment-confirmation flow hands a donation to the verifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum VerificationMode {
    /// Submit to the chain inside the confirmation request.
    #[default]
    Inline,
    /// Record a queued placeholder and let the sweeper submit it.
    Deferred,
}

/// Verification pipeline configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct VerificationConfig {
    pub mode: VerificationMode,

    /// Run the background retry sweep.
    pub sweep_enabled: bool,

    /// Interval between sweeps in seconds.
    pub sweep_interval_secs: u64,

    /// Maximum records processed per sweep and state.
    pub sweep_limit: u32,

    /// Maximum ids accepted by a single batch request.
    pub max_batch_size: usize,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            mode: VerificationMode::Inline,
            sweep_enabled: true,
            sweep_interval_secs: 300,
            sweep_limit: 100,
            max_batch_size: 50,
        }
    }
}

/// Retry configuration for transient chain submission failures.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Enable retries.
    pub enabled: bool,

    /// Maximum number of attempts, including the first.
    pub max_attempts: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_attempts: 3,
            base_delay_ms: 500,
            max_delay_ms: 5000,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Mount the admin routes.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,
}

/// Placeholder key shipped in defaults; refused by validation when admin is enabled.
pub const PLACEHOLDER_API_KEY: &str = "CHANGE_ME_IN_PRODUCTION";

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_key: PLACEHOLDER_API_KEY.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_toml_uses_defaults() {
        let config: CharitraceConfig = toml::from_str(
            r#"
            [blockchain]
            enabled = true
            contract_address = "0x5FbDB2315678afecb367f032d93F642f64180aa3"

            [verification]
            mode = "deferred"
            "#,
        )
        .unwrap();

        assert!(config.blockchain.enabled);
        assert_eq!(config.blockchain.chain_id, 31337);
        assert_eq!(config.verification.mode, VerificationMode::Deferred);
        assert_eq!(config.verification.sweep_interval_secs, 300);
        assert_eq!(config.server.bind_address, "0.0.0.0:8080");
        assert_eq!(config.retries.max_attempts, 3);
    }
}

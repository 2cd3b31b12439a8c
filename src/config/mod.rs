//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse, deserialize, environment overrides)
//!     → validation.rs (semantic checks)
//!     → CharitraceConfig (validated, immutable)
//!     → shared via Arc to all subsystems
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Secrets (signing key, admin key) come from the environment

pub mod loader;
pub mod schema;
pub mod validation;

pub use schema::CharitraceConfig;
pub use schema::{
    AdminConfig, BlockchainConfig, DatabaseConfig, ObservabilityConfig, RetryConfig,
    ServerConfig, VerificationConfig, VerificationMode,
};

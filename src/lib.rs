//! Charitrace: reconciles successful donations with an on-chain ledger.

pub mod admin;
pub mod blockchain;
pub mod config;
pub mod db;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod verification;

pub use config::CharitraceConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use verification::VerificationService;

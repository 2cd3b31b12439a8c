//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use crate::config::schema::CharitraceConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Overrides the database connection string.
pub const DATABASE_URL_ENV_VAR: &str = "CHARITRACE_DATABASE_URL";
/// Overrides the admin bearer key.
pub const ADMIN_API_KEY_ENV_VAR: &str = "CHARITRACE_ADMIN_API_KEY";

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 { write!(f, ", ")?; }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<CharitraceConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    let mut config: CharitraceConfig = toml::from_str(&content).map_err(ConfigError::Parse)?;

    apply_env_overrides(&mut config);
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Build a configuration from defaults and environment only.
pub fn load_default() -> Result<CharitraceConfig, ConfigError> {
    let mut config = CharitraceConfig::default();
    apply_env_overrides(&mut config);
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Apply secrets and deployment-specific values from the environment.
pub fn apply_env_overrides(config: &mut CharitraceConfig) {
    if let Ok(url) = std::env::var(DATABASE_URL_ENV_VAR) {
        config.database.url = url;
    }
    if let Ok(key) = std::env::var(ADMIN_API_KEY_ENV_VAR) {
        config.admin.api_key = key;
    }
}

//! Configuration loading and validation
//!
//! Runtime knobs for the indexer: where the index database lives and how
//! delta propagation retries on conflict. Everything has a default, so an
//! empty TOML file is a valid configuration.

mod types;

pub use types::{Config, PropagationConfig, StorageConfig};

use crate::{ConfigError, ConfigResult};
use sha2::{Digest, Sha256};
use std::path::Path;

/// Loads and validates a TOML configuration file.
pub fn load_config(path: &Path) -> ConfigResult<Config> {
    let contents = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&contents)?;
    validate(&config)?;
    Ok(config)
}

/// Loads a configuration and returns it with the SHA-256 hex digest of the
/// file contents, for recording which configuration produced an index.
pub fn load_config_with_hash(path: &Path) -> ConfigResult<(Config, String)> {
    let contents = std::fs::read_to_string(path)?;
    let hash = hex::encode(Sha256::digest(contents.as_bytes()));
    let config: Config = toml::from_str(&contents)?;
    validate(&config)?;
    Ok((config, hash))
}

/// Validates configuration bounds.
pub fn validate(config: &Config) -> ConfigResult<()> {
    if config.propagation.workers == 0 {
        return Err(ConfigError::Validation(
            "propagation.workers must be at least 1".to_string(),
        ));
    }
    if config.propagation.max_retry_attempts == 0 {
        return Err(ConfigError::Validation(
            "propagation.max-retry-attempts must be at least 1".to_string(),
        ));
    }
    if config.propagation.retry_base_ms == 0 {
        return Err(ConfigError::Validation(
            "propagation.retry-base-ms must be positive".to_string(),
        ));
    }
    if config.propagation.retry_max_ms < config.propagation.retry_base_ms {
        return Err(ConfigError::Validation(
            "propagation.retry-max-ms must be >= retry-base-ms".to_string(),
        ));
    }
    if config.storage.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "storage.database-path must not be empty".to_string(),
        ));
    }
    Ok(())
}

use serde::Deserialize;

/// Main configuration structure for linkdex
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub propagation: PropagationConfig,
}

/// Storage substrate configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Path to the SQLite index database file
    #[serde(rename = "database-path", default = "default_database_path")]
    pub database_path: String,
}

/// Delta propagation and retry behavior
#[derive(Debug, Clone, Deserialize)]
pub struct PropagationConfig {
    /// Number of worker tasks applying mutations
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Total attempts per mutation before a conflict is surfaced
    #[serde(rename = "max-retry-attempts", default = "default_max_retry_attempts")]
    pub max_retry_attempts: u32,

    /// First retry delay (milliseconds)
    #[serde(rename = "retry-base-ms", default = "default_retry_base_ms")]
    pub retry_base_ms: u64,

    /// Retry delay cap (milliseconds)
    #[serde(rename = "retry-max-ms", default = "default_retry_max_ms")]
    pub retry_max_ms: u64,
}

fn default_database_path() -> String {
    "./linkdex.db".to_string()
}

fn default_workers() -> usize {
    4
}

fn default_max_retry_attempts() -> u32 {
    5
}

fn default_retry_base_ms() -> u64 {
    10
}

fn default_retry_max_ms() -> u64 {
    500
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage: StorageConfig::default(),
            propagation: PropagationConfig::default(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

impl Default for PropagationConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            max_retry_attempts: default_max_retry_attempts(),
            retry_base_ms: default_retry_base_ms(),
            retry_max_ms: default_retry_max_ms(),
        }
    }
}

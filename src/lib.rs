//! Linkdex: incremental link-index maintenance
//!
//! This crate maintains derived secondary indices over a continuously mutated
//! collection of web pages: per-URL inbound-link metadata, per-domain
//! aggregate inbound counts, and a sorted link-index entry set. Pages are
//! inserted, updated, or deleted one at a time, each as an isolated
//! transaction, and after every committed mutation the derived indices equal
//! exactly what a from-scratch recomputation over the current page set would
//! produce.

pub mod config;
pub mod indexer;
pub mod model;
pub mod mutation;
pub mod oracle;
pub mod propagate;
pub mod store;
pub mod url;

use thiserror::Error;

/// Main error type for linkdex operations
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("URL error: {0}")]
    Url(#[from] UrlError),

    #[error("Page not found: {url}")]
    NotFound { url: String },

    #[error("Transaction conflict persisted after {attempts} attempts")]
    ConflictExhausted { attempts: u32 },

    #[error("Store error: {0}")]
    Store(#[from] store::StoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Indexer is shut down")]
    Shutdown,
}

impl IndexError {
    /// Returns true if the failed operation may succeed when retried after a
    /// backoff. Only transaction conflicts qualify; every other error is
    /// surfaced to the submitter as-is.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Store(store::StoreError::Conflict(_)))
    }
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing domain in URL")]
    MissingDomain,

    #[error("Malformed URL: {0}")]
    Malformed(String),
}

/// Result type alias for linkdex operations
pub type Result<T> = std::result::Result<T, IndexError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use indexer::{Indexer, PendingMutation};
pub use model::{Link, Mutation, MutationOutcome, Page};
pub use oracle::{compare, Comparison};
pub use store::IndexEntry;
pub use url::{domain_of, extract_domain, normalize_url};

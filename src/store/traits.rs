//! Store trait and error types

use crate::store::IndexEntry;
use thiserror::Error;

/// Errors that can occur during store operations
#[derive(Debug, Error)]
pub enum StoreError {
    /// The substrate rejected the transaction because another writer holds
    /// the database. Retryable after backoff.
    #[error("Transaction conflict: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(rusqlite::Error),

    #[error("Corrupt index entry: {0}")]
    Corrupt(String),

    #[error("Bulk load requires an empty store ({0} rows present)")]
    NotEmpty(u64),
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Non-transactional surface of a derived index store.
///
/// The mutation path goes through a store-specific transaction handle
/// instead; this trait covers the export and bootstrap operations that read
/// or replace whole committed states.
pub trait IndexStore {
    /// Produces the full sorted `(row, column, value)` entry sequence of the
    /// committed state. Each call starts a fresh scan; the result is finite
    /// and ordered lexicographically by row then column.
    fn scan_all(&self) -> StoreResult<Vec<IndexEntry>>;

    /// Seeds an empty store directly from a batch-computed snapshot,
    /// bypassing per-mutation propagation. Fails with `NotEmpty` if any
    /// derived rows already exist.
    fn bulk_load(&mut self, entries: &[IndexEntry]) -> StoreResult<()>;

    /// Returns true if the store holds no pages and no derived records.
    fn is_empty(&self) -> StoreResult<bool>;
}

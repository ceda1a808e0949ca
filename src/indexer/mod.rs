//! Indexer front end
//!
//! The submission surface of the crate: mutations go in, settle, and the
//! committed index state can be scanned or compared. Workers are sharded by
//! page URL so each page's history applies in submission order while
//! mutations to distinct pages may interleave freely.

mod coordinator;

pub use coordinator::{Indexer, PendingMutation};

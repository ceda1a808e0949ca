//! Derived index store
//!
//! This module holds the transactional substrate for the derived indices:
//! per-page rows (the stored outbound link set), per-URL inbound records
//! (`UriInfo`), per-domain aggregates (`DomainStats`), and the sorted
//! `IndexEntry` projection used for export and oracle comparison.

mod schema;
mod sqlite;
mod traits;

pub use sqlite::{IndexTx, SqliteIndexStore};
pub use traits::{IndexStore, StoreError, StoreResult};

// Row key prefixes
pub(crate) const ROW_PAGE: &str = "p:";
pub(crate) const ROW_DOMAIN: &str = "d:";

// Column keys
pub(crate) const COL_OUT: &str = "out:";
pub(crate) const COL_IN: &str = "in:";
pub(crate) const COL_PAGE_OUTCOUNT: &str = "page:outcount";
pub(crate) const COL_STAT_INCOUNT: &str = "stat:incount";
pub(crate) const COL_DOMAIN_INCOUNT: &str = "domain:incount";

/// Derived per-URL record: how many currently-present pages link to this
/// URL. Exists only while the count is positive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UriInfo {
    pub url: String,
    pub domain: String,
    pub inbound_count: i64,
}

/// Derived per-domain record: the sum of inbound counts over every URL in
/// the domain. Exists only while the sum is positive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainStats {
    pub domain: String,
    pub inbound_count: i64,
}

/// One `(row, column, value)` triple of the sorted index projection.
///
/// The full derived index state is exactly the set of these entries; two
/// index states are equal iff their sorted entry sequences are equal.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct IndexEntry {
    pub row: String,
    pub column: String,
    pub value: String,
}

impl IndexEntry {
    pub fn new(row: impl Into<String>, column: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            row: row.into(),
            column: column.into(),
            value: value.into(),
        }
    }

    /// `p:<url>` / `page:outcount`: a present page's outbound link count.
    pub fn page_outcount(url: &str, count: usize) -> Self {
        Self::new(format!("{ROW_PAGE}{url}"), COL_PAGE_OUTCOUNT, count.to_string())
    }

    /// `p:<page>` / `out:<target>`: one outbound edge with its anchor text.
    pub fn outbound(page: &str, target: &str, anchor: &str) -> Self {
        Self::new(format!("{ROW_PAGE}{page}"), format!("{COL_OUT}{target}"), anchor)
    }

    /// `p:<target>` / `in:<source>`: the inbound view of the same edge.
    pub fn inbound(target: &str, source: &str, anchor: &str) -> Self {
        Self::new(format!("{ROW_PAGE}{target}"), format!("{COL_IN}{source}"), anchor)
    }

    /// `p:<url>` / `stat:incount`: the `UriInfo` inbound count.
    pub fn uri_incount(url: &str, count: i64) -> Self {
        Self::new(format!("{ROW_PAGE}{url}"), COL_STAT_INCOUNT, count.to_string())
    }

    /// `d:<domain>` / `domain:incount`: the `DomainStats` aggregate.
    pub fn domain_incount(domain: &str, count: i64) -> Self {
        Self::new(format!("{ROW_DOMAIN}{domain}"), COL_DOMAIN_INCOUNT, count.to_string())
    }
}

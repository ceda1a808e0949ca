//! Consistency oracle
//!
//! Pure comparison between two sorted index-entry sequences, used to check
//! that the incrementally maintained store matches a batch-computed snapshot
//! of the same page set. [`batch::batch_index`] provides the reference
//! recomputation.

mod batch;

pub use batch::batch_index;

use crate::store::IndexEntry;
use std::cmp::Ordering;

/// One differing cell between two index states.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mismatch {
    pub row: String,
    pub column: String,
    /// Value in the left state, if the cell exists there
    pub left: Option<String>,
    /// Value in the right state, if the cell exists there
    pub right: Option<String>,
}

/// Result of comparing two index states.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Comparison {
    Equal,
    Mismatched(Vec<Mismatch>),
}

impl Comparison {
    pub fn is_equal(&self) -> bool {
        matches!(self, Self::Equal)
    }

    pub fn mismatches(&self) -> &[Mismatch] {
        match self {
            Self::Equal => &[],
            Self::Mismatched(mismatches) => mismatches,
        }
    }
}

/// Compares two sorted entry sequences cell by cell.
///
/// Both inputs must be sorted by `(row, column)`, which is what
/// `scan_all` and `batch_index` produce. The comparison is a single merge
/// pass and performs no mutation.
pub fn compare(left: &[IndexEntry], right: &[IndexEntry]) -> Comparison {
    let mut mismatches = Vec::new();
    let mut l = left.iter().peekable();
    let mut r = right.iter().peekable();

    loop {
        match (l.peek(), r.peek()) {
            (None, None) => break,
            (Some(a), None) => {
                mismatches.push(only_left(a));
                l.next();
            }
            (None, Some(b)) => {
                mismatches.push(only_right(b));
                r.next();
            }
            (Some(a), Some(b)) => {
                match (a.row.as_str(), a.column.as_str()).cmp(&(b.row.as_str(), b.column.as_str()))
                {
                    Ordering::Less => {
                        mismatches.push(only_left(a));
                        l.next();
                    }
                    Ordering::Greater => {
                        mismatches.push(only_right(b));
                        r.next();
                    }
                    Ordering::Equal => {
                        if a.value != b.value {
                            mismatches.push(Mismatch {
                                row: a.row.clone(),
                                column: a.column.clone(),
                                left: Some(a.value.clone()),
                                right: Some(b.value.clone()),
                            });
                        }
                        l.next();
                        r.next();
                    }
                }
            }
        }
    }

    if mismatches.is_empty() {
        Comparison::Equal
    } else {
        Comparison::Mismatched(mismatches)
    }
}

fn only_left(entry: &IndexEntry) -> Mismatch {
    Mismatch {
        row: entry.row.clone(),
        column: entry.column.clone(),
        left: Some(entry.value.clone()),
        right: None,
    }
}

fn only_right(entry: &IndexEntry) -> Mismatch {
    Mismatch {
        row: entry.row.clone(),
        column: entry.column.clone(),
        left: None,
        right: Some(entry.value.clone()),
    }
}

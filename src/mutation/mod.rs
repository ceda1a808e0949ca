//! Mutation applier
//!
//! Given a page mutation and the previously stored outbound link set for
//! that page, the applier rewrites the page's own row and emits the signed
//! per-target deltas the propagator turns into URIInfo/DomainStats updates.
//! It runs entirely inside the transaction supplied by the caller, so the
//! page row and every delta commit together.

mod diff;

pub use diff::{diff_links, LinkDiff};

use crate::model::{Link, Mutation, MutationOutcome, Page};
use crate::store::IndexTx;
use crate::url::domain_of;
use crate::{IndexError, Result};

/// One signed inbound-count delta for a link target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UriDelta {
    pub target: String,
    pub domain: String,
    pub delta: i64,
}

impl UriDelta {
    fn for_link(link: &Link, delta: i64) -> Result<Self> {
        Ok(Self {
            target: link.target().to_string(),
            domain: domain_of(link.target())?,
            delta,
        })
    }
}

/// What applying a mutation produced: the delta list for the propagator and
/// the outcome reported to the submitter.
#[derive(Debug)]
pub struct Applied {
    pub deltas: Vec<UriDelta>,
    pub outcome: MutationOutcome,
}

impl Applied {
    fn noop() -> Self {
        Self {
            deltas: Vec::new(),
            outcome: MutationOutcome::Noop,
        }
    }
}

/// Applies a mutation's page-row side inside the supplied transaction and
/// returns the deltas to propagate.
///
/// State machine per page identity:
/// - absent, upsert(S): page row written, `+1` for every target in S
///   (empty S is a no-op since empty pages are not indexed)
/// - present(S), upsert(S'): row rewritten, `+1` for S'\S, `-1` for S\S';
///   anchor-only changes rewrite edge rows without any delta
/// - present(S), delete: row removed, `-1` for every target in S
/// - absent, delete: `NotFound`, nothing touched
pub fn apply(tx: &IndexTx<'_>, mutation: &Mutation) -> Result<Applied> {
    match mutation {
        Mutation::Upsert(page) => apply_upsert(tx, page),
        Mutation::Delete { url } => apply_delete(tx, url),
    }
}

fn apply_upsert(tx: &IndexTx<'_>, page: &Page) -> Result<Applied> {
    let stored = tx.stored_links(page.url())?;

    match stored {
        None if page.is_empty() => {
            tracing::debug!(url = page.url(), "Upsert of empty absent page is a no-op");
            Ok(Applied::noop())
        }
        None => {
            tx.upsert_page_row(page)?;
            let deltas = page
                .outbound()
                .iter()
                .map(|l| UriDelta::for_link(l, 1))
                .collect::<Result<Vec<_>>>()?;
            tracing::debug!(
                url = page.url(),
                links = page.outbound().len(),
                "Inserted page"
            );
            Ok(Applied {
                deltas,
                outcome: MutationOutcome::Applied {
                    links_added: page.outbound().len(),
                    links_removed: 0,
                },
            })
        }
        Some(old) if page.is_empty() => {
            // An update that empties the outbound set un-indexes the page
            tx.remove_page_row(page.url())?;
            let deltas = old
                .iter()
                .map(|l| UriDelta::for_link(l, -1))
                .collect::<Result<Vec<_>>>()?;
            tracing::debug!(url = page.url(), "Emptied page removed from index");
            Ok(Applied {
                outcome: MutationOutcome::Applied {
                    links_added: 0,
                    links_removed: old.len(),
                },
                deltas,
            })
        }
        Some(old) => {
            let diff = diff_links(&old, page.outbound());
            tx.upsert_page_row(page)?;

            let mut deltas = Vec::with_capacity(diff.added.len() + diff.removed.len());
            for link in &diff.added {
                deltas.push(UriDelta::for_link(link, 1)?);
            }
            for link in &diff.removed {
                deltas.push(UriDelta::for_link(link, -1)?);
            }
            tracing::debug!(
                url = page.url(),
                added = diff.added.len(),
                removed = diff.removed.len(),
                retouched = diff.retouched.len(),
                "Updated page"
            );
            Ok(Applied {
                outcome: MutationOutcome::Applied {
                    links_added: diff.added.len(),
                    links_removed: diff.removed.len(),
                },
                deltas,
            })
        }
    }
}

fn apply_delete(tx: &IndexTx<'_>, url: &str) -> Result<Applied> {
    let stored = tx
        .stored_links(url)?
        .ok_or_else(|| IndexError::NotFound {
            url: url.to_string(),
        })?;

    tx.remove_page_row(url)?;
    let deltas = stored
        .iter()
        .map(|l| UriDelta::for_link(l, -1))
        .collect::<Result<Vec<_>>>()?;
    tracing::debug!(url, links = stored.len(), "Deleted page");
    Ok(Applied {
        outcome: MutationOutcome::Applied {
            links_added: 0,
            links_removed: stored.len(),
        },
        deltas,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Link;
    use crate::store::SqliteIndexStore;

    fn page(url: &str, targets: &[(&str, &str)]) -> Page {
        let links = targets
            .iter()
            .map(|(t, a)| Link::new(t, a).unwrap())
            .collect();
        Page::new(url, links).unwrap()
    }

    #[test]
    fn test_insert_emits_positive_deltas() {
        let mut store = SqliteIndexStore::open_in_memory().unwrap();
        let tx = store.begin().unwrap();

        let p = page(
            "https://a.com/",
            &[("https://b.com/x", "b"), ("https://c.com/", "c")],
        );
        let applied = apply(&tx, &Mutation::upsert(p)).unwrap();

        assert_eq!(applied.deltas.len(), 2);
        assert!(applied.deltas.iter().all(|d| d.delta == 1));
        assert_eq!(
            applied.outcome,
            MutationOutcome::Applied {
                links_added: 2,
                links_removed: 0
            }
        );
        let delta = applied
            .deltas
            .iter()
            .find(|d| d.target == "https://b.com/x")
            .unwrap();
        assert_eq!(delta.domain, "b.com");
    }

    #[test]
    fn test_reinsert_is_treated_as_update() {
        let mut store = SqliteIndexStore::open_in_memory().unwrap();
        let tx = store.begin().unwrap();

        apply(
            &tx,
            &Mutation::upsert(page("https://a.com/", &[("https://b.com/", "b")])),
        )
        .unwrap();

        // Same identity inserted again with a different link set: diffed
        // against the stored state, not against empty
        let applied = apply(
            &tx,
            &Mutation::upsert(page("https://a.com/", &[("https://c.com/", "c")])),
        )
        .unwrap();

        assert_eq!(applied.deltas.len(), 2);
        let added = applied.deltas.iter().find(|d| d.delta == 1).unwrap();
        let removed = applied.deltas.iter().find(|d| d.delta == -1).unwrap();
        assert_eq!(added.target, "https://c.com/");
        assert_eq!(removed.target, "https://b.com/");
    }

    #[test]
    fn test_anchor_only_update_emits_no_deltas() {
        let mut store = SqliteIndexStore::open_in_memory().unwrap();
        let tx = store.begin().unwrap();

        apply(
            &tx,
            &Mutation::upsert(page("https://a.com/", &[("https://b.com/", "old")])),
        )
        .unwrap();
        let applied = apply(
            &tx,
            &Mutation::upsert(page("https://a.com/", &[("https://b.com/", "new")])),
        )
        .unwrap();

        assert!(applied.deltas.is_empty());
        // The stored edge carries the new anchor
        let links = tx.stored_links("https://a.com/").unwrap().unwrap();
        assert_eq!(links[0].anchor(), "new");
    }

    #[test]
    fn test_delete_emits_negative_deltas_and_removes_row() {
        let mut store = SqliteIndexStore::open_in_memory().unwrap();
        let tx = store.begin().unwrap();

        apply(
            &tx,
            &Mutation::upsert(page("https://a.com/", &[("https://b.com/", "b")])),
        )
        .unwrap();
        let applied = apply(&tx, &Mutation::delete("https://a.com/").unwrap()).unwrap();

        assert_eq!(applied.deltas.len(), 1);
        assert_eq!(applied.deltas[0].delta, -1);
        assert!(tx.stored_links("https://a.com/").unwrap().is_none());
    }

    #[test]
    fn test_delete_absent_page_is_not_found() {
        let mut store = SqliteIndexStore::open_in_memory().unwrap();
        let tx = store.begin().unwrap();

        let err = apply(&tx, &Mutation::delete("https://a.com/").unwrap()).unwrap_err();
        assert!(matches!(err, IndexError::NotFound { .. }));
    }

    #[test]
    fn test_empty_upsert_of_absent_page_is_noop() {
        let mut store = SqliteIndexStore::open_in_memory().unwrap();
        let tx = store.begin().unwrap();

        let applied = apply(&tx, &Mutation::upsert(page("https://a.com/", &[]))).unwrap();
        assert_eq!(applied.outcome, MutationOutcome::Noop);
        assert!(applied.deltas.is_empty());
        assert!(tx.stored_links("https://a.com/").unwrap().is_none());
    }

    #[test]
    fn test_empty_upsert_of_present_page_removes_it() {
        let mut store = SqliteIndexStore::open_in_memory().unwrap();
        let tx = store.begin().unwrap();

        apply(
            &tx,
            &Mutation::upsert(page("https://a.com/", &[("https://b.com/", "b")])),
        )
        .unwrap();
        let applied = apply(&tx, &Mutation::upsert(page("https://a.com/", &[]))).unwrap();

        assert_eq!(applied.deltas.len(), 1);
        assert_eq!(applied.deltas[0].delta, -1);
        assert!(tx.stored_links("https://a.com/").unwrap().is_none());
    }
}

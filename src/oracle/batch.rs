//! Batch reference computation
//!
//! Recomputes the full derived index from scratch over a page set. This is
//! the oracle the incremental path is measured against, and the producer of
//! snapshots for `bulk_load` bootstrap seeding. It is deliberately simple
//! and single-threaded; a production batch engine would parallelize the
//! same aggregation.

use crate::model::Page;
use crate::store::IndexEntry;
use crate::url::domain_of;
use crate::UrlResult;
use std::collections::BTreeMap;

/// Computes the sorted index-entry sequence for a page set.
///
/// Pages with an empty outbound set are skipped, matching the incremental
/// path's treatment of empty pages. If the iterator yields the same page
/// URL more than once, the last occurrence wins.
pub fn batch_index<'a, I>(pages: I) -> UrlResult<Vec<IndexEntry>>
where
    I: IntoIterator<Item = &'a Page>,
{
    let mut by_url: BTreeMap<&str, &Page> = BTreeMap::new();
    for page in pages {
        by_url.insert(page.url(), page);
    }

    let mut entries = Vec::new();
    let mut inbound: BTreeMap<&str, i64> = BTreeMap::new();

    for page in by_url.values() {
        if page.is_empty() {
            continue;
        }
        entries.push(IndexEntry::page_outcount(page.url(), page.outbound().len()));
        for link in page.outbound() {
            entries.push(IndexEntry::outbound(page.url(), link.target(), link.anchor()));
            entries.push(IndexEntry::inbound(link.target(), page.url(), link.anchor()));
            *inbound.entry(link.target()).or_insert(0) += 1;
        }
    }

    let mut domains: BTreeMap<String, i64> = BTreeMap::new();
    for (target, count) in &inbound {
        entries.push(IndexEntry::uri_incount(target, *count));
        *domains.entry(domain_of(target)?).or_insert(0) += count;
    }

    for (domain, count) in &domains {
        entries.push(IndexEntry::domain_incount(domain, *count));
    }

    entries.sort();
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Link;
    use crate::store::IndexEntry;

    fn page(url: &str, targets: &[(&str, &str)]) -> Page {
        let links = targets
            .iter()
            .map(|(t, a)| Link::new(t, a).unwrap())
            .collect();
        Page::new(url, links).unwrap()
    }

    #[test]
    fn test_empty_page_set() {
        let entries = batch_index(std::iter::empty::<&Page>()).unwrap();
        assert!(entries.is_empty());
    }

    #[test]
    fn test_single_page() {
        let pages = vec![page("https://a.com/", &[("https://b.com/x", "to b")])];
        let entries = batch_index(&pages).unwrap();

        assert!(entries.contains(&IndexEntry::page_outcount("https://a.com/", 1)));
        assert!(entries.contains(&IndexEntry::outbound(
            "https://a.com/",
            "https://b.com/x",
            "to b"
        )));
        assert!(entries.contains(&IndexEntry::inbound(
            "https://b.com/x",
            "https://a.com/",
            "to b"
        )));
        assert!(entries.contains(&IndexEntry::uri_incount("https://b.com/x", 1)));
        assert!(entries.contains(&IndexEntry::domain_incount("b.com", 1)));
        assert_eq!(entries.len(), 5);

        let mut sorted = entries.clone();
        sorted.sort();
        assert_eq!(entries, sorted);
    }

    #[test]
    fn test_inbound_counts_sum_over_sources() {
        let pages = vec![
            page("https://a.com/", &[("https://x.com/", "from a")]),
            page("https://b.com/", &[("https://x.com/", "from b")]),
        ];
        let entries = batch_index(&pages).unwrap();
        assert!(entries.contains(&IndexEntry::uri_incount("https://x.com/", 2)));
        assert!(entries.contains(&IndexEntry::domain_incount("x.com", 2)));
    }

    #[test]
    fn test_domain_aggregates_over_urls() {
        let pages = vec![page(
            "https://a.com/",
            &[("https://d.com/x", "x"), ("https://d.com/y", "y")],
        )];
        let entries = batch_index(&pages).unwrap();
        assert!(entries.contains(&IndexEntry::uri_incount("https://d.com/x", 1)));
        assert!(entries.contains(&IndexEntry::uri_incount("https://d.com/y", 1)));
        assert!(entries.contains(&IndexEntry::domain_incount("d.com", 2)));
    }

    #[test]
    fn test_empty_pages_skipped() {
        let pages = vec![page("https://a.com/", &[])];
        assert!(batch_index(&pages).unwrap().is_empty());
    }
}

//! Outbound link-set diffing
//!
//! Link identity is the target URL, so an anchor-text-only change on a
//! shared target is neither an add nor a remove. It lands in `retouched`:
//! the stored edge rows must be rewritten, but no inbound count moves.

use crate::model::Link;
use std::collections::HashMap;

/// The difference between a page's stored outbound set and its new one.
#[derive(Debug, Default)]
pub struct LinkDiff {
    /// Targets present only in the new set (+1 inbound each)
    pub added: Vec<Link>,
    /// Targets present only in the old set (-1 inbound each)
    pub removed: Vec<Link>,
    /// Shared targets whose anchor text changed (no count delta)
    pub retouched: Vec<Link>,
}

/// Diffs two outbound link sets by target-URL identity.
pub fn diff_links(old: &[Link], new: &[Link]) -> LinkDiff {
    let old_by_target: HashMap<&str, &Link> =
        old.iter().map(|l| (l.target(), l)).collect();
    let new_by_target: HashMap<&str, &Link> =
        new.iter().map(|l| (l.target(), l)).collect();

    let mut diff = LinkDiff::default();

    for link in new {
        match old_by_target.get(link.target()) {
            None => diff.added.push(link.clone()),
            Some(prior) if prior.anchor() != link.anchor() => diff.retouched.push(link.clone()),
            Some(_) => {}
        }
    }

    for link in old {
        if !new_by_target.contains_key(link.target()) {
            diff.removed.push(link.clone());
        }
    }

    diff
}

//! Canonical entity definitions
//!
//! A `Page` is identified by its normalized URL and owns a set of outbound
//! `Link`s. Link identity is the target URL alone: a page links to a given
//! URL at most once, and anchor text is an attribute of the edge rather than
//! part of its identity.

use crate::url::{domain_of, normalize_url};
use crate::UrlResult;
use std::collections::HashSet;
use std::hash::{Hash, Hasher};

/// An outbound link: a normalized target URL plus the anchor text of the
/// edge.
///
/// Equality and hashing consider the target URL only, so replacing a link
/// with one that differs only in anchor text is an attribute update, not an
/// add/remove pair.
#[derive(Debug, Clone)]
pub struct Link {
    target: String,
    anchor: String,
}

impl Link {
    /// Creates a link, normalizing the target URL.
    pub fn new(target: &str, anchor: &str) -> UrlResult<Self> {
        Ok(Self {
            target: normalize_url(target)?,
            anchor: anchor.to_string(),
        })
    }

    /// Rebuilds a link from already-normalized stored values.
    pub(crate) fn from_stored(target: String, anchor: String) -> Self {
        Self { target, anchor }
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn anchor(&self) -> &str {
        &self.anchor
    }
}

impl PartialEq for Link {
    fn eq(&self, other: &Self) -> bool {
        self.target == other.target
    }
}

impl Eq for Link {}

impl Hash for Link {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.target.hash(state);
    }
}

/// A web page: a normalized URL identity plus its outbound link set.
#[derive(Debug, Clone)]
pub struct Page {
    url: String,
    domain: String,
    outbound: Vec<Link>,
}

impl Page {
    /// Creates a page, normalizing its URL and de-duplicating outbound links
    /// by target (first occurrence wins).
    pub fn new(url: &str, outbound: Vec<Link>) -> UrlResult<Self> {
        let url = normalize_url(url)?;
        let domain = domain_of(&url)?;

        let mut seen: HashSet<String> = HashSet::with_capacity(outbound.len());
        let mut deduped = Vec::with_capacity(outbound.len());
        for link in outbound {
            if seen.insert(link.target.clone()) {
                deduped.push(link);
            }
        }

        Ok(Self {
            url,
            domain,
            outbound: deduped,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn outbound(&self) -> &[Link] {
        &self.outbound
    }

    /// A page with no outbound links is never indexed.
    pub fn is_empty(&self) -> bool {
        self.outbound.is_empty()
    }

    /// Adds an outbound link. Returns false if a link to the same target is
    /// already present (the existing edge is kept unchanged).
    pub fn add_outbound(&mut self, link: Link) -> bool {
        if self.outbound.iter().any(|l| l.target == link.target) {
            return false;
        }
        self.outbound.push(link);
        true
    }

    /// Removes the outbound link to the given normalized target, if present.
    pub fn remove_outbound(&mut self, target: &str) -> bool {
        let before = self.outbound.len();
        self.outbound.retain(|l| l.target != target);
        self.outbound.len() != before
    }
}

/// A single-page mutation submitted to the indexer.
///
/// Upserting a page that already exists is an update: the stored outbound
/// set is diffed against the new one. Deleting an absent page reports
/// `NotFound` and changes nothing.
#[derive(Debug, Clone)]
pub enum Mutation {
    Upsert(Page),
    Delete { url: String },
}

impl Mutation {
    pub fn upsert(page: Page) -> Self {
        Self::Upsert(page)
    }

    /// Creates a delete mutation, normalizing the target URL.
    pub fn delete(url: &str) -> UrlResult<Self> {
        Ok(Self::Delete {
            url: normalize_url(url)?,
        })
    }

    /// The page identity this mutation addresses.
    pub fn url(&self) -> &str {
        match self {
            Self::Upsert(page) => page.url(),
            Self::Delete { url } => url,
        }
    }
}

/// What a committed mutation did to the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationOutcome {
    /// The mutation committed; counts describe the outbound link-set delta.
    Applied {
        links_added: usize,
        links_removed: usize,
    },
    /// Nothing to do (upsert of an absent page with no outbound links).
    Noop,
}

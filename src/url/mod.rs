//! URL handling module for linkdex
//!
//! Every page identity and link target in the index is a normalized URL
//! string. Normalization is deterministic and idempotent: feeding an
//! already-normalized URL back through `normalize_url` yields the same
//! string, so URLs can be compared byte-for-byte as identities.

mod domain;
mod normalize;

pub use domain::{domain_of, extract_domain};
pub use normalize::normalize_url;

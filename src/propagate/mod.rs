//! Delta propagator
//!
//! Converts the applier's signed per-target deltas into URIInfo updates and
//! cascades each URIInfo change into its domain's aggregate. The dependency
//! depth is fixed at two (URIInfo, then DomainStats), so propagation
//! enumerates exactly the records it must touch.
//!
//! Deltas are coalesced before application: every delta to the same target,
//! and then every contribution to the same domain, is summed algebraically
//! first. A mutation that removes two links in one domain therefore applies
//! a single `-2` to that domain's stats, and a transient zero crossing can
//! never delete and immediately recreate a record.

mod backoff;

pub use backoff::RetryPolicy;

use crate::mutation::UriDelta;
use crate::store::{DomainStats, IndexTx, UriInfo};
use crate::Result;
use std::collections::BTreeMap;

/// Applies a mutation's delta list inside the same transaction the applier
/// used. URIInfo and DomainStats records are created lazily on first
/// contribution and removed when their count returns to zero.
pub fn apply_deltas(tx: &IndexTx<'_>, deltas: &[UriDelta]) -> Result<()> {
    // Coalesce per target; BTreeMap gives a deterministic application order
    let mut per_target: BTreeMap<&str, (&str, i64)> = BTreeMap::new();
    for delta in deltas {
        let entry = per_target.entry(&delta.target).or_insert((&delta.domain, 0));
        entry.1 += delta.delta;
    }

    let mut per_domain: BTreeMap<&str, i64> = BTreeMap::new();

    for (target, (domain, net)) in per_target {
        if net == 0 {
            continue;
        }

        let current = tx
            .get_uri_info(target)?
            .map(|info| info.inbound_count)
            .unwrap_or(0);
        let mut next = current + net;
        if next < 0 {
            // The applier only emits -1 for links it read in this
            // transaction, so a negative count means derived state drifted
            tracing::error!(url = target, current, net, "Inbound count would go negative");
            next = 0;
        }

        if next == 0 {
            tx.remove_uri_info(target)?;
        } else {
            tx.upsert_uri_info(&UriInfo {
                url: target.to_string(),
                domain: domain.to_string(),
                inbound_count: next,
            })?;
        }

        // Cascade exactly what was applied, not what was requested
        *per_domain.entry(domain).or_insert(0) += next - current;
    }

    for (domain, net) in per_domain {
        if net == 0 {
            continue;
        }

        let current = tx
            .get_domain_stats(domain)?
            .map(|stats| stats.inbound_count)
            .unwrap_or(0);
        let next = (current + net).max(0);

        if next == 0 {
            tx.remove_domain_stats(domain)?;
        } else {
            tx.upsert_domain_stats(&DomainStats {
                domain: domain.to_string(),
                inbound_count: next,
            })?;
        }
    }

    Ok(())
}

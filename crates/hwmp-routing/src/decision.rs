//! Pure acceptance and relevance rules, extracted from the control plane so
//! the branchy protocol conditions are testable in isolation.

use hwmp_core::{IfaceId, MeshAddress, Metric, SeqNo};

use crate::rtable::LookupResult;

/// Outcome of judging an incoming control element against the
/// seen-originator table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acceptance {
    /// Stale or inferior duplicate; drop silently.
    Drop,
    /// Process the element. `fresh_info` is true when the sequence number
    /// advanced past the recorded one.
    Accept { fresh_info: bool },
}

/// PREQ acceptance: drop if the stored sequence number is strictly fresher,
/// or if it ties and the stored metric is no worse.
#[must_use]
pub fn decide_preq_acceptance(
    seen: Option<(SeqNo, Metric)>,
    seqno: SeqNo,
    metric: Metric,
) -> Acceptance {
    match seen {
        None => Acceptance::Accept { fresh_info: true },
        Some((stored_seqno, stored_metric)) => {
            if stored_seqno.is_fresher_than(seqno) {
                Acceptance::Drop
            } else if stored_seqno == seqno {
                if stored_metric <= metric {
                    Acceptance::Drop
                } else {
                    Acceptance::Accept { fresh_info: false }
                }
            } else {
                Acceptance::Accept { fresh_info: true }
            }
        }
    }
}

/// PREP acceptance: drop only if the stored sequence number is strictly
/// fresher. A tie is accepted (the metric may still improve the path).
#[must_use]
pub fn decide_prep_acceptance(seen: Option<(SeqNo, Metric)>, seqno: SeqNo) -> Acceptance {
    match seen {
        None => Acceptance::Accept { fresh_info: true },
        Some((stored_seqno, _)) => {
            if stored_seqno.is_fresher_than(seqno) {
                Acceptance::Drop
            } else {
                Acceptance::Accept {
                    fresh_info: stored_seqno != seqno,
                }
            }
        }
    }
}

/// Whether an accepted element should (re)install a path: fresh sequence
/// information always wins; otherwise only a missing path or a metric
/// improvement does.
#[must_use]
pub fn should_update_path(existing: &LookupResult, fresh_info: bool, metric: Metric) -> bool {
    fresh_info || !existing.found() || existing.metric > metric
}

/// PERR relevance: a failed destination concerns us only when our record
/// points back at the PERR's sender on the same interface and our stored
/// sequence number is not strictly fresher than the advertised failure.
#[must_use]
pub fn perr_entry_relevant(
    record: &LookupResult,
    from: MeshAddress,
    iface: IfaceId,
    advertised: SeqNo,
) -> bool {
    record.retransmitter == from
        && record.iface == iface
        && !record.seqno.is_fresher_than(advertised)
}

/// The unicast-instead-of-broadcast policy: with no neighbors known or with
/// at least `threshold` of them, collapse to a single broadcast receiver.
#[must_use]
pub fn receivers_or_broadcast(
    neighbors: Vec<MeshAddress>,
    threshold: usize,
) -> Vec<MeshAddress> {
    if neighbors.is_empty() || neighbors.len() >= threshold {
        vec![MeshAddress::BROADCAST]
    } else {
        neighbors
    }
}

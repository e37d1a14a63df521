//! Optional observers for routing table mutations and discovery timing.

use hwmp_core::{IfaceId, MeshAddress, Metric, SeqNo};

/// What happened to the routing table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteChangeKind {
    AddReactive,
    AddProactive,
    DeleteReactive,
    DeleteProactive,
}

/// A single routing table mutation.
///
/// Deletions carry only the destination and sequence number; the remaining
/// fields describe the installed path on additions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteChange {
    pub kind: RouteChangeKind,
    pub destination: MeshAddress,
    pub retransmitter: Option<MeshAddress>,
    pub iface: Option<IfaceId>,
    pub metric: Option<Metric>,
    /// Remaining lifetime of the installed path in microseconds.
    pub lifetime_us: Option<u64>,
    pub seqno: SeqNo,
}

impl RouteChange {
    /// A deletion event (reactive or proactive).
    pub fn deleted(kind: RouteChangeKind, destination: MeshAddress, seqno: SeqNo) -> Self {
        Self {
            kind,
            destination,
            retransmitter: None,
            iface: None,
            metric: None,
            lifetime_us: None,
            seqno,
        }
    }
}

/// Observer of routing events. All methods default to no-ops so sinks
/// implement only what they care about.
pub trait TraceSink {
    /// Called on every routing table mutation.
    fn route_change(&mut self, _change: &RouteChange) {}

    /// Called with the elapsed discovery duration when a route resolves or
    /// the retry budget is exhausted.
    fn route_discovery_time(&mut self, _elapsed_us: u64) {}
}

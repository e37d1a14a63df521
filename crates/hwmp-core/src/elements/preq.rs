//! Path Request element.

use crate::error::ElementError;
use crate::types::{MeshAddress, Metric, SeqNo};

/// One requested destination inside a PREQ.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreqDestination {
    pub address: MeshAddress,
    /// The last sequence number the requester knows for this destination
    /// (zero if unknown).
    pub seqno: SeqNo,
    /// Destination-Only: when set, only the named destination may reply.
    pub do_flag: bool,
    /// Reply-and-Forward: with DO clear, an intermediate node may reply on
    /// behalf of the destination but must still forward the request.
    pub rf_flag: bool,
    pub usn_flag: bool,
}

impl PreqDestination {
    pub fn new(address: MeshAddress, seqno: SeqNo, do_flag: bool, rf_flag: bool) -> Self {
        Self {
            address,
            seqno,
            do_flag,
            rf_flag,
            usn_flag: false,
        }
    }

    /// Rewrite flags to "answered, forward without further replies"
    /// (DO = 1, RF = 0), keeping USN untouched.
    pub fn mark_answered(&mut self) {
        self.do_flag = true;
        self.rf_flag = false;
    }
}

/// A Path Request in flight.
///
/// The cumulative `metric` grows by the link metric at every receiving hop;
/// the destination list shrinks (or has its flags rewritten) as stations
/// answer on behalf of destinations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preq {
    pub originator: MeshAddress,
    pub originator_seqno: SeqNo,
    pub preq_id: u32,
    pub hop_count: u8,
    pub ttl: u8,
    /// Advertised path lifetime in TUs.
    pub lifetime_tu: u32,
    pub metric: Metric,
    /// Proactive-PREP suppression flag: when set, receivers of a proactive
    /// PREQ must not answer with a gratuitous PREP.
    pub need_not_prep: bool,
    pub destinations: Vec<PreqDestination>,
}

impl Preq {
    /// A reactive request for a single destination.
    #[allow(clippy::too_many_arguments)]
    pub fn request(
        originator: MeshAddress,
        originator_seqno: SeqNo,
        preq_id: u32,
        ttl: u8,
        lifetime_tu: u32,
        destination: PreqDestination,
    ) -> Self {
        Self {
            originator,
            originator_seqno,
            preq_id,
            hop_count: 0,
            ttl,
            lifetime_tu,
            metric: Metric::new(0),
            need_not_prep: false,
            destinations: vec![destination],
        }
    }

    /// The root's tree-building request: exactly one broadcast destination
    /// with DO and RF set.
    pub fn proactive(
        originator: MeshAddress,
        originator_seqno: SeqNo,
        preq_id: u32,
        ttl: u8,
        lifetime_tu: u32,
    ) -> Self {
        Self {
            originator,
            originator_seqno,
            preq_id,
            hop_count: 0,
            ttl,
            lifetime_tu,
            metric: Metric::new(0),
            need_not_prep: false,
            destinations: vec![PreqDestination::new(
                MeshAddress::BROADCAST,
                SeqNo::new(0),
                true,
                true,
            )],
        }
    }

    /// Add the incoming link's cost to the cumulative path metric.
    pub fn accumulate_metric(&mut self, link: Metric) {
        self.metric = self.metric + link;
    }

    /// Remove a destination that has been fully answered.
    pub fn remove_destination(&mut self, address: MeshAddress) {
        self.destinations.retain(|d| d.address != address);
    }

    #[must_use]
    pub fn dest_count(&self) -> usize {
        self.destinations.len()
    }

    /// Whether this is a proactive (root tree) request.
    #[must_use]
    pub fn is_proactive(&self) -> bool {
        self.destinations.len() == 1 && self.destinations[0].address.is_broadcast()
    }

    /// The single destination of a well-formed proactive PREQ. A broadcast
    /// destination is only legal alone and with DO and RF set.
    pub fn proactive_destination(&self) -> Result<&PreqDestination, ElementError> {
        match self.destinations.as_slice() {
            [dest] if dest.address.is_broadcast() && dest.do_flag && dest.rf_flag => Ok(dest),
            _ => Err(ElementError::MalformedProactivePreq),
        }
    }
}

//! Protocol counters.

use core::fmt;

/// Running counters for one station. Protocol-level drops are counted, not
/// logged as errors.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Statistics {
    pub tx_unicast: u64,
    pub tx_broadcast: u64,
    pub tx_bytes: u64,
    pub dropped_ttl: u64,
    pub total_queued: u64,
    pub total_dropped: u64,
    pub initiated_preq: u64,
    pub initiated_prep: u64,
    pub initiated_perr: u64,
}

impl fmt::Display for Statistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "txUnicast={} txBroadcast={} txBytes={} droppedTtl={} totalQueued={} \
             totalDropped={} initiatedPreq={} initiatedPrep={} initiatedPerr={}",
            self.tx_unicast,
            self.tx_broadcast,
            self.tx_bytes,
            self.dropped_ttl,
            self.total_queued,
            self.total_dropped,
            self.initiated_preq,
            self.initiated_prep,
            self.initiated_perr,
        )
    }
}

//! Freshness tables protecting against stale and duplicate information.

use std::collections::HashMap;

use hwmp_core::{MeshAddress, Metric, SeqNo};

/// Best information seen per control-element originator:
/// `originator -> (last sequence number, best metric at that number)`.
#[derive(Debug, Default)]
pub struct SeenOriginatorTable {
    entries: HashMap<MeshAddress, (SeqNo, Metric)>,
}

impl SeenOriginatorTable {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, originator: MeshAddress) -> Option<(SeqNo, Metric)> {
        self.entries.get(&originator).copied()
    }

    /// Record the latest accepted (seqno, metric) pair for `originator`.
    pub fn record(&mut self, originator: MeshAddress, seqno: SeqNo, metric: Metric) {
        self.entries.insert(originator, (seqno, metric));
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Last data sequence number seen per broadcast source, for duplicate
/// suppression.
#[derive(Debug, Default)]
pub struct DataSeenTable {
    entries: HashMap<MeshAddress, SeqNo>,
}

impl DataSeenTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a broadcast from `source` with `seqno` is stale. A first
    /// sighting records the number; afterwards anything not strictly
    /// fresher — including the boundary-equal case — is dropped.
    pub fn should_drop(&mut self, source: MeshAddress, seqno: SeqNo) -> bool {
        match self.entries.get_mut(&source) {
            None => {
                self.entries.insert(source, seqno);
                false
            }
            Some(last) => {
                if last.is_not_older_than(seqno) {
                    true
                } else {
                    *last = seqno;
                    false
                }
            }
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

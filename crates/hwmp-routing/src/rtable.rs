//! The routing table: reactive paths, the single proactive path, and
//! precursor sets.
//!
//! Inserts are unconditional; the "only if fresher or better" policy lives
//! in the control plane. A path is valid while `now < expires_at`; expired
//! entries are retained so the upstream of a broken path can still be found
//! for PERR generation, until they are explicitly deleted.

use std::collections::HashMap;

use hwmp_core::{FailedDestination, IfaceId, MeshAddress, Metric, SeqNo};

/// Result of a table lookup.
///
/// A miss is encoded with the broadcast sentinel as `retransmitter`,
/// [`IfaceId::ANY`] and the infinite metric, so callers can chain lookups
/// without unwrapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LookupResult {
    /// Next hop toward the destination; broadcast when no path is known.
    pub retransmitter: MeshAddress,
    pub iface: IfaceId,
    pub metric: Metric,
    pub seqno: SeqNo,
    /// Absolute expiry of the entry in microseconds (0 on a miss).
    pub expires_at: u64,
}

impl LookupResult {
    /// The "no path" sentinel.
    pub fn none() -> Self {
        Self {
            retransmitter: MeshAddress::BROADCAST,
            iface: IfaceId::ANY,
            metric: Metric::INFINITE,
            seqno: SeqNo::new(0),
            expires_at: 0,
        }
    }

    /// Whether a real next hop was found.
    #[must_use]
    pub fn found(&self) -> bool {
        !self.retransmitter.is_broadcast()
    }

    /// Remaining lifetime in whole TUs at `now` (0 once expired).
    #[must_use]
    pub fn lifetime_tu(&self, now: u64) -> u32 {
        hwmp_core::constants::us_to_tu(self.expires_at.saturating_sub(now))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Precursor {
    iface: IfaceId,
    neighbor: MeshAddress,
    expires_at: u64,
}

#[derive(Debug, Clone)]
struct ReactiveEntry {
    retransmitter: MeshAddress,
    iface: IfaceId,
    metric: Metric,
    seqno: SeqNo,
    expires_at: u64,
    precursors: Vec<Precursor>,
}

impl ReactiveEntry {
    fn to_lookup(&self) -> LookupResult {
        LookupResult {
            retransmitter: self.retransmitter,
            iface: self.iface,
            metric: self.metric,
            seqno: self.seqno,
            expires_at: self.expires_at,
        }
    }
}

#[derive(Debug, Clone)]
struct ProactiveEntry {
    root: MeshAddress,
    retransmitter: MeshAddress,
    iface: IfaceId,
    metric: Metric,
    seqno: SeqNo,
    expires_at: u64,
    precursors: Vec<Precursor>,
}

impl ProactiveEntry {
    fn to_lookup(&self) -> LookupResult {
        LookupResult {
            retransmitter: self.retransmitter,
            iface: self.iface,
            metric: self.metric,
            seqno: self.seqno,
            expires_at: self.expires_at,
        }
    }
}

fn push_precursor(
    list: &mut Vec<Precursor>,
    iface: IfaceId,
    neighbor: MeshAddress,
    expires_at: u64,
) {
    match list
        .iter_mut()
        .find(|p| p.iface == iface && p.neighbor == neighbor)
    {
        Some(existing) => existing.expires_at = existing.expires_at.max(expires_at),
        None => list.push(Precursor {
            iface,
            neighbor,
            expires_at,
        }),
    }
}

/// Per-station routing state.
#[derive(Debug, Default)]
pub struct RoutingTable {
    reactive: HashMap<MeshAddress, ReactiveEntry>,
    proactive: Option<ProactiveEntry>,
}

impl RoutingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a valid (unexpired) reactive path.
    #[must_use]
    pub fn lookup_reactive(&self, dst: MeshAddress, now: u64) -> LookupResult {
        match self.reactive.get(&dst) {
            Some(entry) if now < entry.expires_at => entry.to_lookup(),
            _ => LookupResult::none(),
        }
    }

    /// Look up a reactive path even if expired; used to find the upstream a
    /// PERR should travel toward. Misses only when no record exists at all.
    #[must_use]
    pub fn lookup_reactive_expired(&self, dst: MeshAddress) -> LookupResult {
        self.reactive
            .get(&dst)
            .map(ReactiveEntry::to_lookup)
            .unwrap_or_else(LookupResult::none)
    }

    /// Look up the valid proactive (root) path.
    #[must_use]
    pub fn lookup_proactive(&self, now: u64) -> LookupResult {
        match &self.proactive {
            Some(entry) if now < entry.expires_at => entry.to_lookup(),
            _ => LookupResult::none(),
        }
    }

    /// Look up the proactive path even if expired.
    #[must_use]
    pub fn lookup_proactive_expired(&self) -> LookupResult {
        self.proactive
            .as_ref()
            .map(ProactiveEntry::to_lookup)
            .unwrap_or_else(LookupResult::none)
    }

    /// The current proactive root, if any path (valid or expired) exists.
    #[must_use]
    pub fn proactive_root(&self) -> Option<MeshAddress> {
        self.proactive.as_ref().map(|entry| entry.root)
    }

    /// Unconditional insert/replace of a reactive path. Precursors of a
    /// replaced entry are kept.
    pub fn add_reactive_path(
        &mut self,
        dst: MeshAddress,
        retransmitter: MeshAddress,
        iface: IfaceId,
        metric: Metric,
        expires_at: u64,
        seqno: SeqNo,
    ) {
        let precursors = self
            .reactive
            .remove(&dst)
            .map(|entry| entry.precursors)
            .unwrap_or_default();
        self.reactive.insert(
            dst,
            ReactiveEntry {
                retransmitter,
                iface,
                metric,
                seqno,
                expires_at,
                precursors,
            },
        );
    }

    /// Install or replace the proactive path.
    pub fn add_proactive_path(
        &mut self,
        metric: Metric,
        root: MeshAddress,
        retransmitter: MeshAddress,
        iface: IfaceId,
        expires_at: u64,
        seqno: SeqNo,
    ) {
        let precursors = self
            .proactive
            .take()
            .map(|entry| entry.precursors)
            .unwrap_or_default();
        self.proactive = Some(ProactiveEntry {
            root,
            retransmitter,
            iface,
            metric,
            seqno,
            expires_at,
            precursors,
        });
    }

    /// Register `neighbor` as depending on the path toward `dst`.
    /// De-duplicated by `(iface, neighbor)`; a repeat refreshes the expiry.
    pub fn add_precursor(
        &mut self,
        dst: MeshAddress,
        iface: IfaceId,
        neighbor: MeshAddress,
        expires_at: u64,
    ) {
        if let Some(entry) = self.reactive.get_mut(&dst) {
            push_precursor(&mut entry.precursors, iface, neighbor, expires_at);
        } else if let Some(entry) = self.proactive.as_mut().filter(|entry| entry.root == dst) {
            push_precursor(&mut entry.precursors, iface, neighbor, expires_at);
        }
    }

    /// Unexpired precursors of `dst` (reactive entry, plus the proactive
    /// entry when `dst` is the root).
    #[must_use]
    pub fn precursors(&self, dst: MeshAddress, now: u64) -> Vec<(IfaceId, MeshAddress)> {
        let mut out = Vec::new();
        if let Some(entry) = self.reactive.get(&dst) {
            out.extend(
                entry
                    .precursors
                    .iter()
                    .filter(|p| now < p.expires_at)
                    .map(|p| (p.iface, p.neighbor)),
            );
        }
        if let Some(entry) = &self.proactive
            && entry.root == dst
        {
            out.extend(
                entry
                    .precursors
                    .iter()
                    .filter(|p| now < p.expires_at)
                    .map(|p| (p.iface, p.neighbor)),
            );
        }
        out
    }

    /// Remove a reactive record entirely. Returns whether one existed.
    pub fn delete_reactive_path(&mut self, dst: MeshAddress) -> bool {
        self.reactive.remove(&dst).is_some()
    }

    /// Remove the proactive record if `dst` is its root. Returns whether it
    /// was removed.
    pub fn delete_proactive_path(&mut self, dst: MeshAddress) -> bool {
        if self.proactive.as_ref().is_some_and(|e| e.root == dst) {
            self.proactive = None;
            true
        } else {
            false
        }
    }

    /// Every destination currently routed through `failed_next_hop`, with
    /// its stored sequence number incremented by one for the PERR
    /// (IEEE 802.11 11B.9.7.2).
    #[must_use]
    pub fn unreachable_destinations(
        &self,
        failed_next_hop: MeshAddress,
    ) -> Vec<FailedDestination> {
        let mut out: Vec<FailedDestination> = self
            .reactive
            .iter()
            .filter(|(_, entry)| entry.retransmitter == failed_next_hop)
            .map(|(dst, entry)| FailedDestination::new(*dst, entry.seqno.incremented()))
            .collect();
        if let Some(entry) = &self.proactive
            && entry.retransmitter == failed_next_hop
        {
            out.push(FailedDestination::new(
                entry.root,
                entry.seqno.incremented(),
            ));
        }
        out
    }

    /// Number of reactive records (including expired ones).
    #[must_use]
    pub fn len(&self) -> usize {
        self.reactive.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.reactive.is_empty() && self.proactive.is_none()
    }

    /// Drop every record.
    pub fn clear(&mut self) {
        self.reactive.clear();
        self.proactive = None;
    }
}

//! Per-destination path discovery retry state.
//!
//! One timer per destination rate-limits PREQ emission: while a timer is
//! armed, further route requests for the same destination only queue their
//! frames. The timer armed after the burst carrying retry number `n` fires
//! `2 * n * net_traversal_time` later, so a full failed discovery with the
//! default three retries spans 2D + 4D + 6D + 8D.

use std::collections::HashMap;

use hwmp_core::MeshAddress;

/// State of one in-flight discovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscoveryState {
    /// When the next retry fires.
    pub deadline: u64,
    /// Retry number that firing will carry (1-based; the initial burst is
    /// not a retry).
    pub retry: u8,
    /// When the discovery began, for the discovery-time trace sample.
    pub started_at: u64,
}

/// Deadline for the burst numbered `retry`.
#[must_use]
pub fn retry_deadline(now: u64, retry: u8, net_traversal_time_us: u64) -> u64 {
    now + 2 * retry as u64 * net_traversal_time_us
}

/// The per-destination discovery timer table.
#[derive(Debug, Default)]
pub struct DiscoveryTimers {
    entries: HashMap<MeshAddress, DiscoveryState>,
}

impl DiscoveryTimers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a PREQ burst for `dst` may be sent now. Arms the first retry
    /// timer on success; returns false while a discovery is already in
    /// flight.
    pub fn should_send_preq(
        &mut self,
        dst: MeshAddress,
        now: u64,
        net_traversal_time_us: u64,
    ) -> bool {
        if self.entries.contains_key(&dst) {
            return false;
        }
        self.entries.insert(
            dst,
            DiscoveryState {
                deadline: retry_deadline(now, 1, net_traversal_time_us),
                retry: 1,
                started_at: now,
            },
        );
        true
    }

    /// Destinations whose retry deadline has passed, with the retry number
    /// each firing carries.
    #[must_use]
    pub fn due(&self, now: u64) -> Vec<(MeshAddress, u8)> {
        self.entries
            .iter()
            .filter(|(_, state)| state.deadline <= now)
            .map(|(dst, state)| (*dst, state.retry))
            .collect()
    }

    /// Arm the next retry for `dst`.
    pub fn reschedule(&mut self, dst: MeshAddress, retry: u8, deadline: u64) {
        if let Some(state) = self.entries.get_mut(&dst) {
            state.retry = retry;
            state.deadline = deadline;
        }
    }

    /// Drop the timer for `dst`, returning its final state.
    pub fn forget(&mut self, dst: MeshAddress) -> Option<DiscoveryState> {
        self.entries.remove(&dst)
    }

    #[must_use]
    pub fn get(&self, dst: MeshAddress) -> Option<&DiscoveryState> {
        self.entries.get(&dst)
    }

    /// Earliest armed deadline, if any.
    #[must_use]
    pub fn next_deadline(&self) -> Option<u64> {
        self.entries.values().map(|state| state.deadline).min()
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

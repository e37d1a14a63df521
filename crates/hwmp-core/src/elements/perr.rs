//! Path Error element.

use crate::types::{MeshAddress, SeqNo};

/// One unreachable destination announced by a PERR.
///
/// The carried sequence number is the tearing station's stored number
/// incremented by one (IEEE 802.11 11B.9.7.2), so receivers holding older
/// information accept the invalidation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailedDestination {
    pub address: MeshAddress,
    pub seqno: SeqNo,
}

impl FailedDestination {
    pub fn new(address: MeshAddress, seqno: SeqNo) -> Self {
        Self { address, seqno }
    }
}

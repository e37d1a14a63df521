//! External interface contracts: the per-interface MAC plugin, the upper
//! layer's reply callback, and the data frame envelope.

use core::fmt;

use hwmp_core::{FailedDestination, IfaceId, MeshAddress, MeshHeader, Prep, Preq, SeqNo};

/// A data frame as it crosses the routing layer.
///
/// Frames from the upper layer arrive without a header; the forwarder
/// stamps one before handing the frame to the MAC, and strips it again on
/// delivery upward.
#[derive(Debug, Clone)]
pub struct MeshFrame {
    pub payload: Vec<u8>,
    pub header: Option<MeshHeader>,
}

impl MeshFrame {
    /// A frame handed down by the upper layer (no mesh header yet).
    pub fn from_upper(payload: Vec<u8>) -> Self {
        Self {
            payload,
            header: None,
        }
    }

    /// A frame received from a mesh peer, with the header the MAC
    /// reconstituted from the wire.
    pub fn from_mesh(payload: Vec<u8>, header: MeshHeader) -> Self {
        Self {
            payload,
            header: Some(header),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

/// Per-frame completion callback handed in with [`request_route`].
///
/// Invoked with `accepted = true` and the output interface once the frame
/// (header stamped with its next hop) is ready for MAC transmission, or
/// with `accepted = false` and [`IfaceId::ANY`] — numerically the infinite
/// metric — when discovery for the frame's destination has failed.
///
/// [`request_route`]: crate::protocol::HwmpProtocol::request_route
pub type RouteReply = Box<dyn FnMut(bool, MeshFrame, MeshAddress, MeshAddress, u16, IfaceId)>;

/// Callback answering "which peers does this interface currently have?".
/// Drives the unicast-instead-of-broadcast thresholds.
pub type NeighborsFn = Box<dyn Fn(IfaceId) -> Vec<MeshAddress>>;

/// One MAC plugin per interface. The protocol calls down through this trait;
/// the plugin frames elements onto the air and calls back into the protocol
/// (`receive_preq` and friends) on its scheduler thread.
pub trait MacPlugin {
    /// Transmit (or forward) a PREQ element.
    fn send_preq(&mut self, preq: &Preq);

    /// Transmit a PREP element to a specific neighbor.
    fn send_prep(&mut self, prep: &Prep, to: MeshAddress);

    /// Compose and transmit a fresh PREQ for `dst` on behalf of this
    /// station, using the supplied sequence numbers.
    fn request_destination(&mut self, dst: MeshAddress, origin_seqno: SeqNo, dst_seqno: SeqNo);

    /// Transmit a locally originated PERR to the listed receivers.
    fn initiate_perr(&mut self, destinations: &[FailedDestination], receivers: &[MeshAddress]);

    /// Forward a received PERR to the listed receivers.
    fn forward_perr(&mut self, destinations: &[FailedDestination], receivers: &[MeshAddress]);

    /// Radio channel this interface operates on; used to suppress duplicate
    /// broadcasts across channel-sharing interfaces.
    fn channel_id(&self) -> u16;

    /// Append this plugin's statistics to a report.
    fn report(&self, _out: &mut dyn fmt::Write) -> fmt::Result {
        Ok(())
    }

    fn reset_stats(&mut self) {}
}

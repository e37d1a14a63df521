//! The HWMP station: control plane, forwarder, and timer driver.
//!
//! A single `HwmpProtocol` owns every mutable structure of one mesh station
//! and is driven entirely from outside: the upper layer hands frames to
//! [`request_route`](HwmpProtocol::request_route), MAC plugins feed received
//! elements into `receive_preq`/`receive_prep`/`receive_perr`, and the
//! scheduler calls [`handle_timers`](HwmpProtocol::handle_timers) whenever a
//! deadline (see [`next_deadline`](HwmpProtocol::next_deadline)) may have
//! passed. No clock is read anywhere; `now` is always supplied in
//! microseconds.

use core::fmt;
use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use hwmp_core::constants::{tu_to_us, us_to_tu};
use hwmp_core::{
    FailedDestination, IfaceId, MeshAddress, MeshHeader, Metric, Prep, Preq, SeqNo,
};

use crate::config::HwmpConfig;
use crate::decision::{
    Acceptance, decide_preq_acceptance, decide_prep_acceptance, perr_entry_relevant,
    receivers_or_broadcast, should_update_path,
};
use crate::plugin::{MacPlugin, MeshFrame, NeighborsFn, RouteReply};
use crate::queue::{PendingQueue, QueuedPacket};
use crate::rtable::RoutingTable;
use crate::seen::{DataSeenTable, SeenOriginatorTable};
use crate::stats::Statistics;
use crate::timers::{DiscoveryTimers, retry_deadline};
use crate::trace::{RouteChange, RouteChangeKind, TraceSink};

/// A PERR ready to go out: the failed destinations plus the per-interface
/// receivers that depend on them.
struct PathError {
    destinations: Vec<FailedDestination>,
    receivers: Vec<(IfaceId, MeshAddress)>,
}

/// Control-frame forwards waiting out the settling delay.
enum Deferred {
    Preq {
        due: u64,
        preq: Preq,
    },
    Prep {
        due: u64,
        prep: Prep,
        to: MeshAddress,
        iface: IfaceId,
    },
    Perr {
        due: u64,
        destinations: Vec<FailedDestination>,
        receivers: Vec<(IfaceId, MeshAddress)>,
    },
}

impl Deferred {
    fn due(&self) -> u64 {
        match self {
            Deferred::Preq { due, .. } | Deferred::Prep { due, .. } | Deferred::Perr { due, .. } => {
                *due
            }
        }
    }
}

/// One mesh station's path selection engine.
pub struct HwmpProtocol {
    address: MeshAddress,
    /// Interface index of the mesh point itself; frames arriving on it come
    /// from the upper layer and carry no mesh header yet.
    mesh_iface: IfaceId,
    config: HwmpConfig,

    rtable: RoutingTable,
    queue: PendingQueue,
    timers: DiscoveryTimers,
    seen: SeenOriginatorTable,
    data_seen: DataSeenTable,

    interfaces: BTreeMap<IfaceId, Box<dyn MacPlugin>>,
    neighbors: Option<NeighborsFn>,
    trace: Option<Box<dyn TraceSink>>,
    stats: Statistics,

    data_seqno: SeqNo,
    hwmp_seqno: SeqNo,
    preq_id: u32,

    is_root: bool,
    proactive_deadline: Option<u64>,
    deferred: Vec<Deferred>,
    rng: StdRng,
}

impl HwmpProtocol {
    /// A station identified by `address`, whose own (upper layer facing)
    /// interface is `mesh_iface`.
    pub fn new(address: MeshAddress, mesh_iface: IfaceId, config: HwmpConfig) -> Self {
        Self::build(address, mesh_iface, config, StdRng::from_entropy())
    }

    /// Like [`new`](Self::new), with a seeded RNG for reproducible runs.
    pub fn with_seed(
        address: MeshAddress,
        mesh_iface: IfaceId,
        config: HwmpConfig,
        seed: u64,
    ) -> Self {
        Self::build(address, mesh_iface, config, StdRng::seed_from_u64(seed))
    }

    fn build(address: MeshAddress, mesh_iface: IfaceId, config: HwmpConfig, rng: StdRng) -> Self {
        let queue = PendingQueue::new(config.max_queue_size);
        Self {
            address,
            mesh_iface,
            config,
            rtable: RoutingTable::new(),
            queue,
            timers: DiscoveryTimers::new(),
            seen: SeenOriginatorTable::new(),
            data_seen: DataSeenTable::new(),
            interfaces: BTreeMap::new(),
            neighbors: None,
            trace: None,
            stats: Statistics::default(),
            data_seqno: SeqNo::new(1),
            hwmp_seqno: SeqNo::new(1),
            preq_id: 0,
            is_root: false,
            proactive_deadline: None,
            deferred: Vec::new(),
            rng,
        }
    }

    /// Install the MAC plugin serving `iface`.
    pub fn add_interface(&mut self, iface: IfaceId, plugin: Box<dyn MacPlugin>) {
        self.interfaces.insert(iface, plugin);
    }

    /// Install the callback answering which peers an interface has.
    pub fn set_neighbors_callback(&mut self, callback: NeighborsFn) {
        self.neighbors = Some(callback);
    }

    /// Attach an observer for route changes and discovery timing.
    pub fn set_trace_sink(&mut self, sink: Box<dyn TraceSink>) {
        self.trace = Some(sink);
    }

    // -- Data path --

    /// Entry point for every data frame, from the upper layer
    /// (`in_iface == mesh_iface`, no header) or from a mesh peer (header
    /// present; TTL is decremented here). Returns whether the frame was
    /// accepted for handling; delivery happens through `reply`.
    pub fn request_route(
        &mut self,
        in_iface: IfaceId,
        src: MeshAddress,
        dst: MeshAddress,
        mut frame: MeshFrame,
        protocol: u16,
        mut reply: RouteReply,
        now: u64,
    ) -> bool {
        if in_iface == self.mesh_iface {
            assert!(
                frame.header.is_none(),
                "HWMP header on a frame from the upper layer"
            );
            let seqno = if dst.is_broadcast() {
                u32::from(self.next_data_seqno())
            } else {
                0
            };
            frame.header = Some(MeshHeader::new(
                MeshAddress::BROADCAST,
                self.config.max_ttl,
                seqno,
            ));
        } else {
            let header = frame
                .header
                .as_mut()
                .expect("HWMP header missing on a frame from the mesh");
            if header.decrement_ttl() == 0 {
                debug!(%src, %dst, "dropping frame, TTL expired");
                self.stats.dropped_ttl += 1;
                return false;
            }
        }

        if dst.is_broadcast() {
            self.stats.tx_broadcast += 1;
            self.stats.tx_bytes += frame.len() as u64;
            let header = frame.header.expect("header stamped above");
            // One transmission per radio channel, not per interface.
            let mut served_channels: Vec<u16> = Vec::new();
            let iface_ids: Vec<IfaceId> = self.interfaces.keys().copied().collect();
            for iface in iface_ids {
                let channel = self.interfaces[&iface].channel_id();
                if served_channels.contains(&channel) {
                    continue;
                }
                served_channels.push(channel);
                for receiver in self.broadcast_receivers(iface) {
                    let copy = MeshFrame {
                        payload: frame.payload.clone(),
                        header: Some(MeshHeader { next_hop: receiver, ..header }),
                    };
                    debug!(%receiver, %iface, "handing broadcast copy to MAC");
                    reply(true, copy, src, dst, protocol, iface);
                }
            }
            true
        } else {
            self.forward_unicast(in_iface, src, dst, frame, protocol, reply, now)
        }
    }

    /// Strip the mesh header from a frame received for local delivery.
    /// The header's absence is a bug in the receive glue.
    pub fn remove_routing_stuff(&self, frame: &mut MeshFrame) -> MeshHeader {
        frame
            .header
            .take()
            .expect("HWMP header missing on a frame received from the mesh")
    }

    /// Broadcast duplicate suppression: true when a frame from `source`
    /// with `seqno` must be dropped (self-echo or stale).
    pub fn drop_data_frame(&mut self, source: MeshAddress, seqno: SeqNo) -> bool {
        if source == self.address {
            debug!(%seqno, "dropping broadcast, self-originated echo");
            return true;
        }
        let drop = self.data_seen.should_drop(source, seqno);
        if drop {
            debug!(%source, %seqno, "dropping broadcast, stale seqno");
        }
        drop
    }

    #[allow(clippy::too_many_arguments)]
    fn forward_unicast(
        &mut self,
        in_iface: IfaceId,
        src: MeshAddress,
        dst: MeshAddress,
        mut frame: MeshFrame,
        protocol: u16,
        mut reply: RouteReply,
        now: u64,
    ) -> bool {
        assert!(!dst.is_broadcast(), "unicast dispatch on a broadcast frame");
        let mut result = self.rtable.lookup_reactive(dst, now);
        if !result.found() {
            result = self.rtable.lookup_proactive(now);
        }
        if result.found() {
            let header = frame.header.as_mut().expect("header stamped by caller");
            header.next_hop = result.retransmitter;
            self.stats.tx_unicast += 1;
            self.stats.tx_bytes += frame.len() as u64;
            reply(true, frame, src, dst, protocol, result.iface);
            return true;
        }

        if in_iface != self.mesh_iface {
            // A mesh peer believed we had a path; tell its side of the mesh
            // the path is gone.
            let mut upstream = self.rtable.lookup_reactive_expired(dst);
            if !upstream.found() {
                upstream = self.rtable.lookup_proactive_expired();
            }
            if upstream.found() {
                debug!(%dst, upstream = %upstream.retransmitter, "initiating path error");
                let destinations = self.rtable.unreachable_destinations(upstream.retransmitter);
                if let Some(perr) = self.make_path_error(&destinations, now) {
                    self.initiate_path_error(perr);
                }
            }
            self.stats.total_dropped += 1;
            return false;
        }

        // Locally originated: discover, then park the frame.
        let expired = self.rtable.lookup_reactive_expired(dst);
        if self
            .timers
            .should_send_preq(dst, now, self.config.net_traversal_time_us)
        {
            let origin_seqno = self.next_hwmp_seqno();
            let dst_seqno = if expired.found() { expired.seqno } else { SeqNo::new(0) };
            self.stats.initiated_preq += 1;
            for plugin in self.interfaces.values_mut() {
                plugin.request_destination(dst, origin_seqno, dst_seqno);
            }
        }
        let packet = QueuedPacket {
            frame,
            src,
            dst,
            protocol,
            in_iface,
            reply,
        };
        match self.queue.enqueue(packet) {
            Ok(()) => {
                self.stats.total_queued += 1;
                true
            }
            Err(_) => {
                debug!(%src, %dst, "dropping frame, pending queue full");
                self.stats.total_dropped += 1;
                false
            }
        }
    }

    // -- Control plane --

    /// Process a received PREQ. `from` is the transmitting interface
    /// address, `from_mp` the transmitting mesh point, `link_metric` the
    /// cost of the link it arrived over, `forwarding_delay` the settling
    /// delay before any forward goes out.
    #[allow(clippy::too_many_arguments)]
    pub fn receive_preq(
        &mut self,
        mut preq: Preq,
        from: MeshAddress,
        iface: IfaceId,
        from_mp: MeshAddress,
        link_metric: Metric,
        forwarding_delay: u64,
        now: u64,
    ) {
        preq.accumulate_metric(link_metric);
        let fresh_info = match decide_preq_acceptance(
            self.seen.get(preq.originator),
            preq.originator_seqno,
            preq.metric,
        ) {
            Acceptance::Drop => {
                debug!(originator = %preq.originator, seqno = %preq.originator_seqno,
                       "dropping PREQ, stale or inferior");
                return;
            }
            Acceptance::Accept { fresh_info } => fresh_info,
        };
        self.seen
            .record(preq.originator, preq.originator_seqno, preq.metric);
        debug!(originator = %preq.originator, %from, "accepted PREQ");

        let lifetime_us = tu_to_us(preq.lifetime_tu);

        // Reverse path toward the originator.
        let existing = self.rtable.lookup_reactive(preq.originator, now);
        if should_update_path(&existing, fresh_info, preq.metric) {
            self.install_reactive(
                preq.originator,
                from,
                iface,
                preq.metric,
                now + lifetime_us,
                preq.originator_seqno,
                now,
            );
            self.reactive_path_resolved(preq.originator, now);
        }
        // Reverse path toward the transmitting peer.
        let existing = self.rtable.lookup_reactive(from_mp, now);
        if should_update_path(&existing, false, link_metric) {
            self.install_reactive(
                from_mp,
                from,
                iface,
                link_metric,
                now + lifetime_us,
                preq.originator_seqno,
                now,
            );
            self.reactive_path_resolved(from_mp, now);
        }

        let mut i = 0;
        while i < preq.destinations.len() {
            let dest = preq.destinations[i];
            if dest.address.is_broadcast() {
                // Only a proactive PREQ names the broadcast address, and it
                // names nothing else.
                preq.proactive_destination()
                    .expect("broadcast destination in a non-proactive PREQ");
                let current = self.rtable.lookup_proactive(now);
                if !current.found() || current.metric > preq.metric {
                    self.rtable.add_proactive_path(
                        preq.metric,
                        preq.originator,
                        from,
                        iface,
                        now + lifetime_us,
                        preq.originator_seqno,
                    );
                    self.trace_change(RouteChange {
                        kind: RouteChangeKind::AddProactive,
                        destination: preq.originator,
                        retransmitter: Some(from),
                        iface: Some(iface),
                        metric: Some(preq.metric),
                        lifetime_us: Some(lifetime_us),
                        seqno: preq.originator_seqno,
                    });
                    self.proactive_path_resolved(now);
                }
                if !preq.need_not_prep {
                    let destination_seqno = self.next_hwmp_seqno();
                    self.send_prep(
                        self.address,
                        preq.originator,
                        from,
                        Metric::new(0),
                        preq.originator_seqno,
                        destination_seqno,
                        preq.lifetime_tu,
                        iface,
                    );
                }
                break;
            }
            if dest.address == self.address {
                let destination_seqno = self.next_hwmp_seqno();
                self.send_prep(
                    self.address,
                    preq.originator,
                    from,
                    Metric::new(0),
                    preq.originator_seqno,
                    destination_seqno,
                    preq.lifetime_tu,
                    iface,
                );
                assert!(
                    self.rtable.lookup_reactive(preq.originator, now).found(),
                    "answered a PREQ without a reverse path to its originator"
                );
                preq.destinations.remove(i);
                continue;
            }
            // Intermediate reply on behalf of a destination we have a fresh
            // path for.
            let result = self.rtable.lookup_reactive(dest.address, now);
            if !dest.do_flag && result.found() {
                let lifetime_tu = result.lifetime_tu(now);
                if lifetime_tu > 0 && result.seqno.is_not_older_than(dest.seqno) {
                    self.send_prep(
                        dest.address,
                        preq.originator,
                        from,
                        result.metric,
                        preq.originator_seqno,
                        result.seqno,
                        lifetime_tu,
                        iface,
                    );
                    self.rtable
                        .add_precursor(dest.address, iface, from, now + lifetime_us);
                    if dest.rf_flag {
                        preq.destinations[i].mark_answered();
                    } else {
                        preq.destinations.remove(i);
                        continue;
                    }
                }
            }
            i += 1;
        }

        if preq.destinations.is_empty() {
            return;
        }
        debug!(originator = %preq.originator, remaining = preq.dest_count(),
               delay_us = forwarding_delay, "scheduling PREQ forward");
        self.deferred.push(Deferred::Preq {
            due: now + forwarding_delay,
            preq,
        });
    }

    /// Process a received PREP.
    #[allow(clippy::too_many_arguments)]
    pub fn receive_prep(
        &mut self,
        mut prep: Prep,
        from: MeshAddress,
        iface: IfaceId,
        from_mp: MeshAddress,
        link_metric: Metric,
        forwarding_delay: u64,
        now: u64,
    ) {
        prep.accumulate_metric(link_metric);
        let fresh_info =
            match decide_prep_acceptance(self.seen.get(prep.originator), prep.destination_seqno) {
                Acceptance::Drop => {
                    debug!(originator = %prep.originator, "dropping PREP, stale");
                    return;
                }
                Acceptance::Accept { fresh_info } => fresh_info,
            };
        self.seen
            .record(prep.originator, prep.destination_seqno, prep.metric);
        debug!(originator = %prep.originator, %from, "accepted PREP");

        let lifetime_us = tu_to_us(prep.lifetime_tu);
        // The return path toward the requester, before any mutation below.
        let return_path = self.rtable.lookup_reactive(prep.destination, now);

        let existing = self.rtable.lookup_reactive(prep.originator, now);
        if should_update_path(&existing, fresh_info, prep.metric) {
            self.install_reactive(
                prep.originator,
                from,
                iface,
                prep.metric,
                now + lifetime_us,
                prep.destination_seqno,
                now,
            );
            self.rtable
                .add_precursor(prep.destination, iface, from, now + lifetime_us);
            if return_path.found() {
                self.rtable.add_precursor(
                    prep.originator,
                    iface,
                    return_path.retransmitter,
                    return_path.expires_at,
                );
            }
            self.reactive_path_resolved(prep.originator, now);
        }
        let existing = self.rtable.lookup_reactive(from_mp, now);
        if should_update_path(&existing, false, link_metric) {
            self.install_reactive(
                from_mp,
                from,
                iface,
                link_metric,
                now + lifetime_us,
                prep.destination_seqno,
                now,
            );
            self.reactive_path_resolved(from_mp, now);
        }

        if prep.destination == self.address {
            debug!(resolved = %prep.originator, "discovery resolved");
            return;
        }
        if !return_path.found() {
            // Broken reverse path; nobody to hand the reply to.
            debug!(destination = %prep.destination, "dropping PREP, no return path");
            return;
        }
        self.deferred.push(Deferred::Prep {
            due: now + forwarding_delay,
            prep,
            to: return_path.retransmitter,
            iface: return_path.iface,
        });
    }

    /// Process a received PERR: keep only destinations whose stored next
    /// hop is the sender, tear those down, and pass the error on.
    pub fn receive_perr(
        &mut self,
        destinations: Vec<FailedDestination>,
        from: MeshAddress,
        iface: IfaceId,
        _from_mp: MeshAddress,
        forwarding_delay: u64,
        now: u64,
    ) {
        let relevant: Vec<FailedDestination> = destinations
            .into_iter()
            .filter(|failed| {
                let record = self.rtable.lookup_reactive_expired(failed.address);
                perr_entry_relevant(&record, from, iface, failed.seqno)
            })
            .collect();
        if relevant.is_empty() {
            debug!(%from, "PERR with no relevant destinations");
            return;
        }
        if let Some(perr) = self.make_path_error(&relevant, now) {
            self.forward_path_error(perr, forwarding_delay, now);
        }
    }

    /// Peer link notification from a MAC plugin. A dropped link invalidates
    /// every path through that peer.
    pub fn peer_link_status(
        &mut self,
        _mesh_addr: MeshAddress,
        peer: MeshAddress,
        _iface: IfaceId,
        up: bool,
        now: u64,
    ) {
        if up {
            return;
        }
        let destinations = self.rtable.unreachable_destinations(peer);
        debug!(%peer, count = destinations.len(), "peer link down");
        if let Some(perr) = self.make_path_error(&destinations, now) {
            self.initiate_path_error(perr);
        }
    }

    // -- Proactive root --

    /// Become the tree root: the first proactive PREQ goes out after a
    /// uniform random delay in `[0, random_start]`, then periodically.
    pub fn set_root(&mut self, now: u64) {
        debug!(address = %self.address, "becoming root");
        self.is_root = true;
        let jitter = self.rng.gen_range(0..=self.config.random_start_us);
        self.proactive_deadline = Some(now + jitter);
    }

    /// Stop announcing the tree. Already distributed proactive paths decay
    /// on their own.
    pub fn unset_root(&mut self) {
        self.is_root = false;
        self.proactive_deadline = None;
    }

    #[must_use]
    pub fn is_root(&self) -> bool {
        self.is_root
    }

    fn send_proactive_preq(&mut self, now: u64) {
        let originator_seqno = self.next_hwmp_seqno();
        let preq_id = self.next_preq_id();
        let preq = Preq::proactive(
            self.address,
            originator_seqno,
            preq_id,
            self.config.max_ttl,
            us_to_tu(self.config.active_root_timeout_us),
        );
        debug!(%preq_id, "sending proactive PREQ");
        for plugin in self.interfaces.values_mut() {
            plugin.send_preq(&preq);
        }
        self.proactive_deadline = Some(now + self.config.path_to_root_interval_us);
    }

    // -- Timer driver --

    /// Fire everything whose deadline has passed: the proactive PREQ timer,
    /// per-destination discovery retries, and delayed control forwards.
    pub fn handle_timers(&mut self, now: u64) {
        if let Some(due) = self.proactive_deadline
            && due <= now
            && self.is_root
        {
            self.send_proactive_preq(now);
        }

        for (dst, retry) in self.timers.due(now) {
            self.retry_path_discovery(dst, retry, now);
        }

        let mut fired = Vec::new();
        let mut i = 0;
        while i < self.deferred.len() {
            if self.deferred[i].due() <= now {
                fired.push(self.deferred.remove(i));
            } else {
                i += 1;
            }
        }
        for item in fired {
            match item {
                Deferred::Preq { preq, .. } => {
                    for plugin in self.interfaces.values_mut() {
                        plugin.send_preq(&preq);
                    }
                }
                Deferred::Prep { prep, to, iface, .. } => {
                    let plugin = self
                        .interfaces
                        .get_mut(&iface)
                        .expect("PREP forward on an uninstalled interface");
                    plugin.send_prep(&prep, to);
                }
                Deferred::Perr {
                    destinations,
                    receivers,
                    ..
                } => {
                    self.deliver_perr(&destinations, &receivers, true);
                }
            }
        }
    }

    /// Earliest pending deadline, for discrete-event drivers.
    #[must_use]
    pub fn next_deadline(&self) -> Option<u64> {
        let deferred = self.deferred.iter().map(Deferred::due).min();
        [self.proactive_deadline, self.timers.next_deadline(), deferred]
            .into_iter()
            .flatten()
            .min()
    }

    /// Cancel all timers and deferred work and clear every table.
    pub fn teardown(&mut self) {
        self.proactive_deadline = None;
        self.deferred.clear();
        self.timers.clear();
        self.queue.clear();
        self.seen.clear();
        self.data_seen.clear();
        self.rtable.clear();
    }

    fn retry_path_discovery(&mut self, dst: MeshAddress, retry: u8, now: u64) {
        let mut result = self.rtable.lookup_reactive(dst, now);
        if !result.found() {
            result = self.rtable.lookup_proactive(now);
        }
        if result.found() {
            // Resolved since the last burst; the discovery is over.
            self.timers.forget(dst);
            return;
        }
        if retry > self.config.max_preq_retries {
            // Give up: flush the queue with a NACK per frame.
            while let Some(mut packet) = self.queue.dequeue_first_for(dst) {
                self.stats.total_dropped += 1;
                (packet.reply)(
                    false,
                    packet.frame,
                    packet.src,
                    packet.dst,
                    packet.protocol,
                    IfaceId::ANY,
                );
            }
            let state = self
                .timers
                .forget(dst)
                .expect("retry fired without a timer");
            debug!(%dst, "path discovery failed");
            self.trace_discovery_time(now - state.started_at);
            return;
        }
        let origin_seqno = self.next_hwmp_seqno();
        let dst_seqno = self.rtable.lookup_reactive_expired(dst).seqno;
        debug!(%dst, retry, "retrying path discovery");
        for plugin in self.interfaces.values_mut() {
            plugin.request_destination(dst, origin_seqno, dst_seqno);
        }
        self.timers.reschedule(
            dst,
            retry + 1,
            retry_deadline(now, retry + 1, self.config.net_traversal_time_us),
        );
    }

    // -- Path resolution --

    fn reactive_path_resolved(&mut self, dst: MeshAddress, now: u64) {
        if let Some(state) = self.timers.get(dst) {
            let elapsed = now - state.started_at;
            self.trace_discovery_time(elapsed);
        }
        let result = self.rtable.lookup_reactive(dst, now);
        assert!(
            result.found(),
            "resolved path lookup returned the broadcast sentinel"
        );
        while let Some(mut packet) = self.queue.dequeue_first_for(dst) {
            let header = packet
                .frame
                .header
                .as_mut()
                .expect("queued frame without a header");
            header.next_hop = result.retransmitter;
            self.stats.tx_unicast += 1;
            self.stats.tx_bytes += packet.frame.len() as u64;
            (packet.reply)(
                true,
                packet.frame,
                packet.src,
                packet.dst,
                packet.protocol,
                result.iface,
            );
        }
    }

    fn proactive_path_resolved(&mut self, now: u64) {
        let result = self.rtable.lookup_proactive(now);
        assert!(
            result.found(),
            "proactive resolution without a proactive path"
        );
        // Everything still parked can ride the tree toward the root.
        while let Some(mut packet) = self.queue.dequeue_first() {
            let header = packet
                .frame
                .header
                .as_mut()
                .expect("queued frame without a header");
            header.next_hop = result.retransmitter;
            self.stats.tx_unicast += 1;
            self.stats.tx_bytes += packet.frame.len() as u64;
            (packet.reply)(
                true,
                packet.frame,
                packet.src,
                packet.dst,
                packet.protocol,
                result.iface,
            );
        }
    }

    // -- Path error machinery --

    /// Collect the PERR receivers for `destinations` and tear the paths
    /// down. Returns `None` when nobody depends on them (no PERR goes out,
    /// but the paths are gone either way).
    fn make_path_error(
        &mut self,
        destinations: &[FailedDestination],
        now: u64,
    ) -> Option<PathError> {
        let mut receivers: Vec<(IfaceId, MeshAddress)> = Vec::new();
        for failed in destinations {
            for precursor in self.rtable.precursors(failed.address, now) {
                // One PERR per neighbor, regardless of interface.
                if !receivers.iter().any(|(_, n)| *n == precursor.1) {
                    receivers.push(precursor);
                }
            }
        }
        for failed in destinations {
            if self.rtable.delete_reactive_path(failed.address) {
                self.trace_change(RouteChange::deleted(
                    RouteChangeKind::DeleteReactive,
                    failed.address,
                    failed.seqno,
                ));
            }
            if self.rtable.delete_proactive_path(failed.address) {
                self.trace_change(RouteChange::deleted(
                    RouteChangeKind::DeleteProactive,
                    failed.address,
                    failed.seqno,
                ));
            }
        }
        if receivers.is_empty() {
            return None;
        }
        self.stats.initiated_perr += 1;
        Some(PathError {
            destinations: destinations.to_vec(),
            receivers,
        })
    }

    /// Emit a locally detected PERR immediately.
    fn initiate_path_error(&mut self, perr: PathError) {
        self.deliver_perr(&perr.destinations, &perr.receivers, false);
    }

    /// Forward a received PERR once the settling delay has passed.
    fn forward_path_error(&mut self, perr: PathError, forwarding_delay: u64, now: u64) {
        self.deferred.push(Deferred::Perr {
            due: now + forwarding_delay,
            destinations: perr.destinations,
            receivers: perr.receivers,
        });
    }

    fn deliver_perr(
        &mut self,
        destinations: &[FailedDestination],
        receivers: &[(IfaceId, MeshAddress)],
        forward: bool,
    ) {
        let iface_ids: Vec<IfaceId> = self.interfaces.keys().copied().collect();
        for iface in iface_ids {
            let mut for_iface: Vec<MeshAddress> = receivers
                .iter()
                .filter(|(i, _)| *i == iface)
                .map(|(_, neighbor)| *neighbor)
                .collect();
            if for_iface.is_empty() {
                continue;
            }
            if for_iface.len() >= self.config.unicast_perr_threshold {
                for_iface = vec![MeshAddress::BROADCAST];
            }
            let plugin = self
                .interfaces
                .get_mut(&iface)
                .expect("interface listed above");
            if forward {
                plugin.forward_perr(destinations, &for_iface);
            } else {
                plugin.initiate_perr(destinations, &for_iface);
            }
        }
    }

    // -- Element emission --

    #[allow(clippy::too_many_arguments)]
    fn send_prep(
        &mut self,
        src: MeshAddress,
        dst: MeshAddress,
        retransmitter: MeshAddress,
        init_metric: Metric,
        originator_seqno: SeqNo,
        destination_seqno: SeqNo,
        lifetime_tu: u32,
        iface: IfaceId,
    ) {
        let prep = Prep {
            originator: src,
            originator_seqno,
            destination: dst,
            destination_seqno,
            hop_count: 0,
            ttl: self.config.max_ttl,
            lifetime_tu,
            metric: init_metric,
        };
        let plugin = self
            .interfaces
            .get_mut(&iface)
            .expect("PREP emission on an uninstalled interface");
        plugin.send_prep(&prep, retransmitter);
        self.stats.initiated_prep += 1;
    }

    fn install_reactive(
        &mut self,
        dst: MeshAddress,
        retransmitter: MeshAddress,
        iface: IfaceId,
        metric: Metric,
        expires_at: u64,
        seqno: SeqNo,
        now: u64,
    ) {
        self.rtable
            .add_reactive_path(dst, retransmitter, iface, metric, expires_at, seqno);
        self.trace_change(RouteChange {
            kind: RouteChangeKind::AddReactive,
            destination: dst,
            retransmitter: Some(retransmitter),
            iface: Some(iface),
            metric: Some(metric),
            lifetime_us: Some(expires_at - now),
            seqno,
        });
    }

    fn trace_change(&mut self, change: RouteChange) {
        if let Some(sink) = &mut self.trace {
            sink.route_change(&change);
        }
    }

    fn trace_discovery_time(&mut self, elapsed_us: u64) {
        if let Some(sink) = &mut self.trace {
            sink.route_discovery_time(elapsed_us);
        }
    }

    // -- Receiver policies --

    /// Receivers for a PREQ on `iface`: the neighbor list, or broadcast at
    /// the PREQ unicast threshold.
    #[must_use]
    pub fn preq_receivers(&self, iface: IfaceId) -> Vec<MeshAddress> {
        let neighbors = self
            .neighbors
            .as_ref()
            .map(|cb| cb(iface))
            .unwrap_or_default();
        receivers_or_broadcast(neighbors, self.config.unicast_preq_threshold)
    }

    /// Receivers for broadcast data on `iface`: the neighbor list, or
    /// broadcast at the data unicast threshold.
    #[must_use]
    pub fn broadcast_receivers(&self, iface: IfaceId) -> Vec<MeshAddress> {
        let neighbors = self
            .neighbors
            .as_ref()
            .map(|cb| cb(iface))
            .unwrap_or_default();
        receivers_or_broadcast(neighbors, self.config.unicast_data_threshold)
    }

    // -- Sequence number and identifier wells --

    /// Acquire a fresh HWMP sequence number.
    pub fn next_hwmp_seqno(&mut self) -> SeqNo {
        self.hwmp_seqno += 1;
        self.hwmp_seqno
    }

    /// Acquire a fresh PREQ identifier.
    pub fn next_preq_id(&mut self) -> u32 {
        self.preq_id = self.preq_id.wrapping_add(1);
        self.preq_id
    }

    fn next_data_seqno(&mut self) -> SeqNo {
        let seqno = self.data_seqno;
        self.data_seqno += 1;
        seqno
    }

    // -- Accessors --

    #[must_use]
    pub fn address(&self) -> MeshAddress {
        self.address
    }

    #[must_use]
    pub fn config(&self) -> &HwmpConfig {
        &self.config
    }

    #[must_use]
    pub fn stats(&self) -> &Statistics {
        &self.stats
    }

    #[must_use]
    pub fn routing_table(&self) -> &RoutingTable {
        &self.rtable
    }

    pub fn routing_table_mut(&mut self) -> &mut RoutingTable {
        &mut self.rtable
    }

    #[must_use]
    pub fn queued_len(&self) -> usize {
        self.queue.len()
    }

    /// Reactive path lifetime advertised on originated elements, in TUs.
    #[must_use]
    pub fn active_path_lifetime_tu(&self) -> u32 {
        us_to_tu(self.config.active_path_timeout_us)
    }

    #[must_use]
    pub fn max_ttl(&self) -> u8 {
        self.config.max_ttl
    }

    #[must_use]
    pub fn do_flag(&self) -> bool {
        self.config.do_flag
    }

    #[must_use]
    pub fn rf_flag(&self) -> bool {
        self.config.rf_flag
    }

    #[must_use]
    pub fn preq_min_interval_us(&self) -> u64 {
        self.config.preq_min_interval_us
    }

    #[must_use]
    pub fn perr_min_interval_us(&self) -> u64 {
        self.config.perr_min_interval_us
    }

    #[must_use]
    pub fn unicast_perr_threshold(&self) -> usize {
        self.config.unicast_perr_threshold
    }

    /// Append the station's configuration and statistics, then each
    /// plugin's report.
    pub fn report(&self, out: &mut dyn fmt::Write) -> fmt::Result {
        writeln!(
            out,
            "hwmp station {} isRoot={} maxTtl={} maxQueueSize={}",
            self.address, self.is_root, self.config.max_ttl, self.config.max_queue_size
        )?;
        writeln!(out, "  {}", self.stats)?;
        for (iface, plugin) in &self.interfaces {
            write!(out, "  iface {iface}: ")?;
            plugin.report(out)?;
            writeln!(out)?;
        }
        Ok(())
    }

    /// Zero the station's counters and cascade to every plugin.
    pub fn reset_stats(&mut self) {
        self.stats = Statistics::default();
        for plugin in self.interfaces.values_mut() {
            plugin.reset_stats();
        }
    }
}

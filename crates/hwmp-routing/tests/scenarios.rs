//! End-to-end protocol scenarios over hand-wired stations.
//!
//! Each station runs a real `HwmpProtocol` with recording MAC plugins; the
//! test body plays the role of the air between them, feeding every emitted
//! element into the neighboring station.

use std::cell::RefCell;
use std::rc::Rc;

use hwmp_core::{FailedDestination, IfaceId, MeshAddress, Metric, Prep, Preq, PreqDestination, SeqNo};
use hwmp_routing::plugin::{MacPlugin, MeshFrame, RouteReply};
use hwmp_routing::{HwmpConfig, HwmpProtocol};

/// The mesh point's own (upper layer facing) interface.
const MESH_IF: IfaceId = IfaceId(0);
/// The single radio of most test stations.
const RADIO_IF: IfaceId = IfaceId(1);
/// Airtime cost of every test link.
const LINK: Metric = Metric::new(10);
/// Net diameter traversal time from the default config.
const D: u64 = 102_400;

fn addr(seed: u8) -> MeshAddress {
    MeshAddress::new([seed, 0, 0, 0, 0, seed])
}

#[derive(Debug, Clone, PartialEq)]
enum PluginCall {
    Preq(Preq),
    Prep(Prep, MeshAddress),
    Request {
        dst: MeshAddress,
        origin_seqno: SeqNo,
        dst_seqno: SeqNo,
    },
    InitiatePerr {
        destinations: Vec<FailedDestination>,
        receivers: Vec<MeshAddress>,
    },
    ForwardPerr {
        destinations: Vec<FailedDestination>,
        receivers: Vec<MeshAddress>,
    },
}

struct Recorder {
    channel: u16,
    calls: Rc<RefCell<Vec<PluginCall>>>,
}

impl MacPlugin for Recorder {
    fn send_preq(&mut self, preq: &Preq) {
        self.calls.borrow_mut().push(PluginCall::Preq(preq.clone()));
    }

    fn send_prep(&mut self, prep: &Prep, to: MeshAddress) {
        self.calls
            .borrow_mut()
            .push(PluginCall::Prep(prep.clone(), to));
    }

    fn request_destination(&mut self, dst: MeshAddress, origin_seqno: SeqNo, dst_seqno: SeqNo) {
        self.calls.borrow_mut().push(PluginCall::Request {
            dst,
            origin_seqno,
            dst_seqno,
        });
    }

    fn initiate_perr(&mut self, destinations: &[FailedDestination], receivers: &[MeshAddress]) {
        self.calls.borrow_mut().push(PluginCall::InitiatePerr {
            destinations: destinations.to_vec(),
            receivers: receivers.to_vec(),
        });
    }

    fn forward_perr(&mut self, destinations: &[FailedDestination], receivers: &[MeshAddress]) {
        self.calls.borrow_mut().push(PluginCall::ForwardPerr {
            destinations: destinations.to_vec(),
            receivers: receivers.to_vec(),
        });
    }

    fn channel_id(&self) -> u16 {
        self.channel
    }
}

struct Station {
    proto: HwmpProtocol,
    calls: Rc<RefCell<Vec<PluginCall>>>,
}

impl Station {
    fn new(seed: u8) -> Self {
        Self::with_config(seed, HwmpConfig::default())
    }

    fn with_config(seed: u8, config: HwmpConfig) -> Self {
        let mut proto = HwmpProtocol::with_seed(addr(seed), MESH_IF, config, seed as u64);
        let calls = Rc::new(RefCell::new(Vec::new()));
        proto.add_interface(
            RADIO_IF,
            Box::new(Recorder {
                channel: 1,
                calls: calls.clone(),
            }),
        );
        Self { proto, calls }
    }

    fn address(&self) -> MeshAddress {
        self.proto.address()
    }

    fn take_calls(&self) -> Vec<PluginCall> {
        self.calls.borrow_mut().drain(..).collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Delivery {
    accepted: bool,
    next_hop: Option<MeshAddress>,
    ttl: Option<u8>,
    dst: MeshAddress,
    iface: IfaceId,
}

fn recording_reply(log: Rc<RefCell<Vec<Delivery>>>) -> RouteReply {
    Box::new(move |accepted, frame, _src, dst, _protocol, iface| {
        log.borrow_mut().push(Delivery {
            accepted,
            next_hop: frame.header.map(|h| h.next_hop),
            ttl: frame.header.map(|h| h.ttl),
            dst,
            iface,
        });
    })
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug")),
        )
        .with_test_writer()
        .try_init();
}

/// The PREQ a test MAC composes from a `RequestDestination` call.
fn preq_for_request(
    originator: MeshAddress,
    origin_seqno: SeqNo,
    dst: MeshAddress,
    dst_seqno: SeqNo,
    preq_id: u32,
) -> Preq {
    Preq::request(
        originator,
        origin_seqno,
        preq_id,
        32,
        5000,
        PreqDestination::new(dst, dst_seqno, false, true),
    )
}

fn expect_request(call: &PluginCall) -> (MeshAddress, SeqNo, SeqNo) {
    match call {
        PluginCall::Request {
            dst,
            origin_seqno,
            dst_seqno,
        } => (*dst, *origin_seqno, *dst_seqno),
        other => panic!("expected RequestDestination, got {other:?}"),
    }
}

fn expect_preq(call: &PluginCall) -> Preq {
    match call {
        PluginCall::Preq(preq) => preq.clone(),
        other => panic!("expected PREQ, got {other:?}"),
    }
}

fn expect_prep(call: &PluginCall) -> (Prep, MeshAddress) {
    match call {
        PluginCall::Prep(prep, to) => (prep.clone(), *to),
        other => panic!("expected PREP, got {other:?}"),
    }
}

// === Scenario 1: three-hop discovery over a line topology ===

#[test]
fn three_hop_discovery() {
    init_tracing();
    let mut a = Station::new(1);
    let mut b = Station::new(2);
    let mut c = Station::new(3);
    let mut d = Station::new(4);
    let now = 1_000;

    // A hands a frame for D down; no path yet, so A queues and discovers.
    let deliveries = Rc::new(RefCell::new(Vec::new()));
    let accepted = a.proto.request_route(
        MESH_IF,
        a.address(),
        d.address(),
        MeshFrame::from_upper(vec![0xAB; 64]),
        0x0800,
        recording_reply(deliveries.clone()),
        now,
    );
    assert!(accepted);
    assert_eq!(a.proto.queued_len(), 1);
    assert!(deliveries.borrow().is_empty());

    let calls = a.take_calls();
    assert_eq!(calls.len(), 1);
    let (req_dst, origin_seqno, dst_seqno) = expect_request(&calls[0]);
    assert_eq!(req_dst, d.address());
    assert_eq!(dst_seqno, SeqNo::new(0));

    // B hears the PREQ, installs the reverse path and forwards.
    let preq = preq_for_request(a.address(), origin_seqno, d.address(), dst_seqno, 1);
    b.proto
        .receive_preq(preq, a.address(), RADIO_IF, a.address(), LINK, 0, now);
    let toward_a = b.proto.routing_table().lookup_reactive(a.address(), now);
    assert_eq!(toward_a.retransmitter, a.address());
    assert_eq!(toward_a.metric, Metric::new(10));

    b.proto.handle_timers(now);
    let preq = expect_preq(&b.take_calls()[0]);
    assert_eq!(preq.metric, Metric::new(10));

    // C does the same.
    c.proto
        .receive_preq(preq, b.address(), RADIO_IF, b.address(), LINK, 0, now);
    c.proto.handle_timers(now);
    let preq = expect_preq(&c.take_calls()[0]);
    assert_eq!(preq.metric, Metric::new(20));

    // D is the destination: it answers with a PREP and forwards nothing.
    d.proto
        .receive_preq(preq, c.address(), RADIO_IF, c.address(), LINK, 0, now);
    d.proto.handle_timers(now);
    let calls = d.take_calls();
    assert_eq!(calls.len(), 1, "destination must not forward the PREQ");
    let (prep, to) = expect_prep(&calls[0]);
    assert_eq!(to, c.address());
    assert_eq!(prep.metric, Metric::new(0));
    assert_eq!(prep.originator, d.address());
    assert_eq!(prep.destination, a.address());
    // The advertised destination SN is D's own, freshly incremented.
    assert_eq!(prep.destination_seqno, SeqNo::new(2));

    // The PREP rides the reverse paths: C, then B, then A.
    c.proto
        .receive_prep(prep, d.address(), RADIO_IF, d.address(), LINK, 0, now);
    assert_eq!(
        c.proto
            .routing_table()
            .lookup_reactive(d.address(), now)
            .metric,
        Metric::new(10)
    );
    c.proto.handle_timers(now);
    let (prep, to) = expect_prep(&c.take_calls()[0]);
    assert_eq!(to, b.address());

    b.proto
        .receive_prep(prep, c.address(), RADIO_IF, c.address(), LINK, 0, now);
    b.proto.handle_timers(now);
    let (prep, to) = expect_prep(&b.take_calls()[0]);
    assert_eq!(to, a.address());

    a.proto
        .receive_prep(prep, b.address(), RADIO_IF, b.address(), LINK, 0, now);

    // A's table points at B with the accumulated metric, and the queued
    // frame went out stamped for B.
    let toward_d = a.proto.routing_table().lookup_reactive(d.address(), now);
    assert_eq!(toward_d.retransmitter, b.address());
    assert_eq!(toward_d.metric, Metric::new(30));

    assert_eq!(a.proto.queued_len(), 0);
    let deliveries = deliveries.borrow();
    assert_eq!(deliveries.len(), 1);
    assert!(deliveries[0].accepted);
    assert_eq!(deliveries[0].next_hop, Some(b.address()));
    assert_eq!(deliveries[0].iface, RADIO_IF);
    assert_eq!(a.proto.stats().tx_unicast, 1);
}

// === Scenario 2: stale PREQ suppression ===

#[test]
fn stale_preq_suppressed() {
    init_tracing();
    let mut b = Station::new(2);
    let x = addr(9); // originator, two hops away
    let w = addr(8); // the forwarder transmitting to us
    let y = addr(7); // requested destination
    let now = 1_000;

    let mut first = Preq::request(
        x,
        SeqNo::new(5),
        1,
        32,
        5000,
        PreqDestination::new(y, SeqNo::new(0), false, true),
    );
    first.metric = Metric::new(90); // 90 + 10 link = 100 cumulative
    b.proto.receive_preq(first, w, RADIO_IF, w, LINK, 0, now);
    b.proto.handle_timers(now);
    assert_eq!(b.take_calls().len(), 1, "first PREQ forwards");
    assert_eq!(
        b.proto.routing_table().lookup_reactive(x, now).metric,
        Metric::new(100)
    );

    // Same SN, worse cumulative metric: silently dropped.
    let mut second = Preq::request(
        x,
        SeqNo::new(5),
        2,
        32,
        5000,
        PreqDestination::new(y, SeqNo::new(0), false, true),
    );
    second.metric = Metric::new(110); // 110 + 10 link = 120 cumulative
    b.proto.receive_preq(second, w, RADIO_IF, w, LINK, 0, now);
    b.proto.handle_timers(now);
    assert!(b.take_calls().is_empty(), "stale PREQ must not forward");
    assert_eq!(
        b.proto.routing_table().lookup_reactive(x, now).metric,
        Metric::new(100),
        "stale PREQ must not touch the table"
    );
}

// === Scenario 3: TTL handling on forwarded frames ===

#[test]
fn ttl_expiry_drops_frame() {
    init_tracing();
    let mut b = Station::new(2);
    let dst = addr(9);
    let via = addr(5);
    let now = 0;
    b.proto
        .routing_table_mut()
        .add_reactive_path(dst, via, RADIO_IF, Metric::new(10), 1_000_000, SeqNo::new(1));

    // TTL 2 survives the decrement and goes out with TTL 1.
    let deliveries = Rc::new(RefCell::new(Vec::new()));
    let frame = MeshFrame::from_mesh(
        vec![1, 2, 3],
        hwmp_core::MeshHeader::new(b.address(), 2, 0),
    );
    assert!(b.proto.request_route(
        RADIO_IF,
        addr(1),
        dst,
        frame,
        0x0800,
        recording_reply(deliveries.clone()),
        now,
    ));
    assert_eq!(deliveries.borrow()[0].ttl, Some(1));
    assert_eq!(deliveries.borrow()[0].next_hop, Some(via));

    // TTL 1 decrements to zero and is dropped.
    let frame = MeshFrame::from_mesh(
        vec![1, 2, 3],
        hwmp_core::MeshHeader::new(b.address(), 1, 0),
    );
    assert!(!b.proto.request_route(
        RADIO_IF,
        addr(1),
        dst,
        frame,
        0x0800,
        recording_reply(deliveries.clone()),
        now,
    ));
    assert_eq!(deliveries.borrow().len(), 1);
    assert_eq!(b.proto.stats().dropped_ttl, 1);
}

// === Scenario 4: retry exhaustion over the 2D+4D+6D+8D ladder ===

#[test]
fn retry_exhaustion_nacks_queued_frames() {
    init_tracing();
    let mut a = Station::new(1);
    let dst = addr(9);
    let deliveries = Rc::new(RefCell::new(Vec::new()));

    assert!(a.proto.request_route(
        MESH_IF,
        a.address(),
        dst,
        MeshFrame::from_upper(vec![0x55]),
        0x0800,
        recording_reply(deliveries.clone()),
        0,
    ));
    assert_eq!(a.take_calls().len(), 1, "initial burst");

    // A second frame for the same destination queues without a new burst.
    assert!(a.proto.request_route(
        MESH_IF,
        a.address(),
        dst,
        MeshFrame::from_upper(vec![0x56]),
        0x0800,
        recording_reply(deliveries.clone()),
        1,
    ));
    assert!(a.take_calls().is_empty(), "discovery already in flight");
    assert_eq!(a.proto.queued_len(), 2);

    // Nothing fires early.
    a.proto.handle_timers(2 * D - 1);
    assert!(a.take_calls().is_empty());

    // Three retries at 2D, 6D and 12D (intervals 2D, 4D, 6D).
    for at in [2 * D, 6 * D, 12 * D] {
        a.proto.handle_timers(at);
        let calls = a.take_calls();
        assert_eq!(calls.len(), 1, "exactly one burst at t={at}");
        expect_request(&calls[0]);
        assert!(deliveries.borrow().is_empty());
    }

    // The final firing at 20D (interval 8D) gives up and NACKs the queue.
    a.proto.handle_timers(20 * D);
    assert!(a.take_calls().is_empty(), "no burst past the retry budget");
    let deliveries = deliveries.borrow();
    assert_eq!(deliveries.len(), 2);
    for delivery in deliveries.iter() {
        assert!(!delivery.accepted);
        assert_eq!(delivery.iface, IfaceId::ANY);
        assert_eq!(delivery.dst, dst);
    }
    assert_eq!(a.proto.queued_len(), 0);
    assert_eq!(a.proto.stats().total_dropped, 2);

    // The timer entry is gone: a new request starts a fresh discovery.
    let fresh = Rc::new(RefCell::new(Vec::new()));
    assert!(a.proto.request_route(
        MESH_IF,
        a.address(),
        dst,
        MeshFrame::from_upper(vec![0x57]),
        0x0800,
        recording_reply(fresh),
        21 * D,
    ));
    assert_eq!(a.take_calls().len(), 1);
}

// === Scenario 5: peer-link drop generates a PERR with incremented SNs ===

#[test]
fn peer_link_down_emits_perr() {
    init_tracing();
    let mut b = Station::new(2);
    let peer = addr(5);
    let x = addr(3);
    let y = addr(4);
    let now = 0;

    let table = b.proto.routing_table_mut();
    table.add_reactive_path(x, peer, RADIO_IF, Metric::new(10), 1_000_000, SeqNo::new(7));
    table.add_reactive_path(y, peer, RADIO_IF, Metric::new(20), 1_000_000, SeqNo::new(3));
    table.add_precursor(x, RADIO_IF, addr(6), 1_000_000);
    table.add_precursor(y, RADIO_IF, addr(7), 1_000_000);

    b.proto.peer_link_status(b.address(), peer, RADIO_IF, false, now);

    let calls = b.take_calls();
    assert_eq!(calls.len(), 1);
    let PluginCall::InitiatePerr {
        mut destinations,
        mut receivers,
    } = calls[0].clone()
    else {
        panic!("expected InitiatePerr, got {:?}", calls[0]);
    };
    destinations.sort_by_key(|f| f.address);
    receivers.sort();
    assert_eq!(
        destinations,
        vec![
            FailedDestination::new(x, SeqNo::new(8)),
            FailedDestination::new(y, SeqNo::new(4)),
        ]
    );
    assert_eq!(receivers, vec![addr(6), addr(7)]);

    // Both records are gone, not merely expired.
    assert!(!b.proto.routing_table().lookup_reactive_expired(x).found());
    assert!(!b.proto.routing_table().lookup_reactive_expired(y).found());
    assert_eq!(b.proto.stats().initiated_perr, 1);
}

/// A peer drop with no precursors tears paths down silently.
#[test]
fn peer_link_down_without_precursors_is_silent() {
    init_tracing();
    let mut b = Station::new(2);
    let peer = addr(5);
    let x = addr(3);
    b.proto.routing_table_mut().add_reactive_path(
        x,
        peer,
        RADIO_IF,
        Metric::new(10),
        1_000_000,
        SeqNo::new(7),
    );

    b.proto.peer_link_status(b.address(), peer, RADIO_IF, false, 0);

    assert!(b.take_calls().is_empty(), "no receivers, no PERR");
    assert!(!b.proto.routing_table().lookup_reactive_expired(x).found());
    assert_eq!(b.proto.stats().initiated_perr, 0);
}

// === PERR relevance filtering and forwarding ===

#[test]
fn perr_forwarded_only_for_relevant_destinations() {
    init_tracing();
    let mut b = Station::new(2);
    let peer = addr(5);
    let other = addr(6);
    let x = addr(3); // routed via peer: relevant
    let y = addr(4); // routed via another neighbor: irrelevant
    let now = 0;

    let table = b.proto.routing_table_mut();
    table.add_reactive_path(x, peer, RADIO_IF, Metric::new(10), 1_000_000, SeqNo::new(7));
    table.add_reactive_path(y, other, RADIO_IF, Metric::new(10), 1_000_000, SeqNo::new(2));
    table.add_precursor(x, RADIO_IF, addr(8), 1_000_000);

    b.proto.receive_perr(
        vec![
            FailedDestination::new(x, SeqNo::new(8)),
            FailedDestination::new(y, SeqNo::new(3)),
        ],
        peer,
        RADIO_IF,
        peer,
        0,
        now,
    );
    b.proto.handle_timers(now);

    let calls = b.take_calls();
    assert_eq!(calls.len(), 1);
    let PluginCall::ForwardPerr { destinations, receivers } = calls[0].clone() else {
        panic!("expected ForwardPerr, got {:?}", calls[0]);
    };
    assert_eq!(destinations, vec![FailedDestination::new(x, SeqNo::new(8))]);
    assert_eq!(receivers, vec![addr(8)]);

    // The irrelevant path survives.
    assert!(b.proto.routing_table().lookup_reactive(y, now).found());
    assert!(!b.proto.routing_table().lookup_reactive_expired(x).found());
}

#[test]
fn perr_with_fresher_stored_seqno_is_dropped() {
    init_tracing();
    let mut b = Station::new(2);
    let peer = addr(5);
    let x = addr(3);
    b.proto.routing_table_mut().add_reactive_path(
        x,
        peer,
        RADIO_IF,
        Metric::new(10),
        1_000_000,
        SeqNo::new(9),
    );

    b.proto.receive_perr(
        vec![FailedDestination::new(x, SeqNo::new(8))],
        peer,
        RADIO_IF,
        peer,
        0,
        0,
    );
    b.proto.handle_timers(0);

    assert!(b.take_calls().is_empty());
    assert!(b.proto.routing_table().lookup_reactive(x, 0).found());
}

// === Scenario 6: broadcast duplicate suppression ===

#[test]
fn broadcast_dedup_by_source_and_seqno() {
    init_tracing();
    let mut b = Station::new(2);
    let src = addr(9);

    assert!(!b.proto.drop_data_frame(src, SeqNo::new(10)));
    assert!(b.proto.drop_data_frame(src, SeqNo::new(10)), "duplicate");
    assert!(!b.proto.drop_data_frame(src, SeqNo::new(11)));
    assert!(b.proto.drop_data_frame(src, SeqNo::new(9)), "stale");
    // Self-originated echoes always drop.
    assert!(b.proto.drop_data_frame(b.address(), SeqNo::new(99)));
}

// === Round-trip law: a PREQ naming us yields one PREP with metric 0 ===

#[test]
fn self_preq_yields_single_prep() {
    init_tracing();
    let mut d = Station::new(4);
    let a = addr(1);
    let now = 0;

    let preq = preq_for_request(a, SeqNo::new(2), d.address(), SeqNo::new(0), 1);
    d.proto.receive_preq(preq, a, RADIO_IF, a, LINK, 0, now);
    d.proto.handle_timers(now);

    let calls = d.take_calls();
    assert_eq!(calls.len(), 1, "one PREP, no forwarding");
    let (prep, to) = expect_prep(&calls[0]);
    assert_eq!(to, a);
    assert_eq!(prep.metric, Metric::new(0));
    assert_eq!(prep.originator, d.address());
    assert_eq!(prep.originator_seqno, SeqNo::new(2));
    assert_eq!(d.proto.stats().initiated_prep, 1);
}

// === Broadcast fan-out across channel-sharing interfaces ===

#[test]
fn broadcast_fans_out_once_per_channel() {
    init_tracing();
    let mut a = Station::new(1);
    // A second radio on the same channel and a third on another one.
    let calls2 = Rc::new(RefCell::new(Vec::new()));
    a.proto.add_interface(
        IfaceId(2),
        Box::new(Recorder {
            channel: 1,
            calls: calls2,
        }),
    );
    let calls3 = Rc::new(RefCell::new(Vec::new()));
    a.proto.add_interface(
        IfaceId(3),
        Box::new(Recorder {
            channel: 6,
            calls: calls3,
        }),
    );

    let deliveries = Rc::new(RefCell::new(Vec::new()));
    assert!(a.proto.request_route(
        MESH_IF,
        a.address(),
        MeshAddress::BROADCAST,
        MeshFrame::from_upper(vec![0xEE; 32]),
        0x0800,
        recording_reply(deliveries.clone()),
        0,
    ));

    let deliveries = deliveries.borrow();
    // Channel 1 served once (via interface 1), channel 6 once (interface 3).
    assert_eq!(deliveries.len(), 2);
    assert_eq!(deliveries[0].iface, RADIO_IF);
    assert_eq!(deliveries[1].iface, IfaceId(3));
    for delivery in deliveries.iter() {
        assert!(delivery.accepted);
        assert_eq!(delivery.next_hop, Some(MeshAddress::BROADCAST));
        assert_eq!(delivery.ttl, Some(32));
    }
    assert_eq!(a.proto.stats().tx_broadcast, 1);
}

// === Queue bound ===

#[test]
fn queue_overflow_drops_frame() {
    init_tracing();
    let config = HwmpConfig {
        max_queue_size: 2,
        ..HwmpConfig::default()
    };
    let mut a = Station::with_config(1, config);
    let dst = addr(9);
    let deliveries = Rc::new(RefCell::new(Vec::new()));

    for _ in 0..2 {
        assert!(a.proto.request_route(
            MESH_IF,
            a.address(),
            dst,
            MeshFrame::from_upper(vec![0x01]),
            0x0800,
            recording_reply(deliveries.clone()),
            0,
        ));
    }
    assert!(
        !a.proto.request_route(
            MESH_IF,
            a.address(),
            dst,
            MeshFrame::from_upper(vec![0x03]),
            0x0800,
            recording_reply(deliveries.clone()),
            0,
        ),
        "third frame exceeds the queue bound"
    );
    assert_eq!(a.proto.queued_len(), 2);
    assert_eq!(a.proto.stats().total_queued, 2);
    assert_eq!(a.proto.stats().total_dropped, 1);
}

// === Proactive tree mode ===

#[test]
fn root_emits_periodic_proactive_preqs() {
    init_tracing();
    let mut root = Station::new(1);
    root.proto.set_root(0);

    let first = root.proto.next_deadline().expect("root timer armed");
    assert!(first <= root.proto.config().random_start_us);

    root.proto.handle_timers(first);
    let calls = root.take_calls();
    assert_eq!(calls.len(), 1);
    let preq = expect_preq(&calls[0]);
    assert!(preq.is_proactive());
    assert_eq!(preq.ttl, 32);
    assert_eq!(preq.lifetime_tu, 5000);
    assert!(preq.destinations[0].do_flag && preq.destinations[0].rf_flag);

    // Rearmed at the path-to-root interval.
    let next = root.proto.next_deadline().unwrap();
    assert_eq!(next, first + root.proto.config().path_to_root_interval_us);
    root.proto.handle_timers(next);
    assert_eq!(root.take_calls().len(), 1);

    // Unset cancels the timer.
    root.proto.unset_root();
    assert!(root.proto.next_deadline().is_none());
    root.proto.handle_timers(next * 2);
    assert!(root.take_calls().is_empty());
}

#[test]
fn proactive_preq_installs_tree_path_and_answers() {
    init_tracing();
    let mut root = Station::new(1);
    let mut b = Station::new(2);
    let now = 500;

    root.proto.set_root(0);
    let first = root.proto.next_deadline().unwrap();
    root.proto.handle_timers(first);
    let preq = expect_preq(&root.take_calls()[0]);

    b.proto
        .receive_preq(preq, root.address(), RADIO_IF, root.address(), LINK, 0, now);

    let tree = b.proto.routing_table().lookup_proactive(now);
    assert!(tree.found());
    assert_eq!(tree.retransmitter, root.address());
    assert_eq!(tree.metric, Metric::new(10));
    assert_eq!(b.proto.routing_table().proactive_root(), Some(root.address()));

    // A gratuitous PREP confirms the path back to the root, and the
    // proactive PREQ is still flooded on.
    b.proto.handle_timers(now);
    let calls = b.take_calls();
    assert_eq!(calls.len(), 2);
    let (prep, to) = expect_prep(&calls[0]);
    assert_eq!(to, root.address());
    assert_eq!(prep.metric, Metric::new(0));
    assert_eq!(prep.destination, root.address());
    let forwarded = expect_preq(&calls[1]);
    assert!(forwarded.is_proactive());
    assert_eq!(forwarded.metric, Metric::new(10));
}

#[test]
fn unicast_without_path_rides_proactive_tree() {
    init_tracing();
    let mut b = Station::new(2);
    let root = addr(1);
    let dst = addr(9);
    let now = 0;
    b.proto.routing_table_mut().add_proactive_path(
        Metric::new(10),
        root,
        root,
        RADIO_IF,
        1_000_000,
        SeqNo::new(4),
    );

    let deliveries = Rc::new(RefCell::new(Vec::new()));
    assert!(b.proto.request_route(
        MESH_IF,
        b.address(),
        dst,
        MeshFrame::from_upper(vec![0x11]),
        0x0800,
        recording_reply(deliveries.clone()),
        now,
    ));
    // No discovery needed: the frame goes straight toward the root.
    assert!(b.take_calls().is_empty());
    assert_eq!(deliveries.borrow()[0].next_hop, Some(root));
}

// === Teardown ===

#[test]
fn teardown_cancels_timers_and_clears_state() {
    init_tracing();
    let mut a = Station::new(1);
    a.proto.set_root(0);
    let deliveries = Rc::new(RefCell::new(Vec::new()));
    a.proto.request_route(
        MESH_IF,
        a.address(),
        addr(9),
        MeshFrame::from_upper(vec![0x01]),
        0x0800,
        recording_reply(deliveries.clone()),
        0,
    );
    a.take_calls();

    a.proto.teardown();
    assert!(a.proto.next_deadline().is_none());
    assert_eq!(a.proto.queued_len(), 0);
    assert!(a.proto.routing_table().is_empty());

    a.proto.handle_timers(u64::MAX);
    assert!(a.take_calls().is_empty());
    assert!(deliveries.borrow().is_empty(), "no NACK after teardown");
}

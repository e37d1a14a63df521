//! Hybrid Wireless Mesh Path selection engine for an 802.11s mesh station.
//!
//! The engine learns, maintains and invalidates Layer-2 paths between mesh
//! stations driven by three control elements (PREQ, PREP, PERR), and
//! decides for every data frame whether it can be transmitted immediately,
//! must wait for path resolution, or must be dropped.
//!
//! Everything runs single-threaded and clockless: entry points take `now`
//! in microseconds and deferred work is released by an external driver
//! through [`HwmpProtocol::handle_timers`].
//!
//! [`HwmpProtocol::handle_timers`]: protocol::HwmpProtocol::handle_timers

pub mod config;
pub mod constants;
pub mod decision;
pub mod error;
pub mod plugin;
pub mod protocol;
pub mod queue;
pub mod rtable;
pub mod seen;
pub mod stats;
pub mod timers;
pub mod trace;

pub use config::HwmpConfig;
pub use plugin::{MacPlugin, MeshFrame, NeighborsFn, RouteReply};
pub use protocol::HwmpProtocol;
pub use rtable::{LookupResult, RoutingTable};
pub use stats::Statistics;
pub use trace::{RouteChange, RouteChangeKind, TraceSink};

//! Core vocabulary for the Hybrid Wireless Mesh Path selection protocol.
//!
//! This crate holds the types that travel between stations — addresses,
//! sequence numbers, metrics, the PREQ/PREP/PERR information elements and
//! the per-hop mesh header — with no I/O, tables, or notion of time. The
//! routing engine lives in `hwmp-routing`.

pub mod constants;
pub mod elements;
pub mod error;
pub mod header;
pub mod types;

pub use elements::{FailedDestination, Prep, Preq, PreqDestination};
pub use header::MeshHeader;
pub use types::{IfaceId, MeshAddress, Metric, SeqNo};

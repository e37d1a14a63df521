//! Protocol constants (IEEE 802.11s HWMP defaults).

use hwmp_core::constants::TU_US;

/// Random delay bound before the first proactive PREQ.
pub const RANDOM_START_US: u64 = 100_000;

/// Maximum number of frames queued while resolving routes.
pub const MAX_QUEUE_SIZE: usize = 255;

/// PREQ retries before a destination is declared unreachable.
pub const MAX_PREQ_RETRIES: u8 = 3;

/// Time for a frame to cross the network diameter once.
pub const NET_TRAVERSAL_TIME_US: u64 = 100 * TU_US;

/// Minimal interval between successive PREQs.
pub const PREQ_MIN_INTERVAL_US: u64 = 100 * TU_US;

/// Minimal interval between successive PERRs.
pub const PERR_MIN_INTERVAL_US: u64 = 100 * TU_US;

/// Lifetime of proactive (root tree) routing information.
pub const ACTIVE_ROOT_TIMEOUT_US: u64 = 5000 * TU_US;

/// Lifetime of reactive routing information.
pub const ACTIVE_PATH_TIMEOUT_US: u64 = 5000 * TU_US;

/// Interval between successive proactive PREQs.
pub const PATH_TO_ROOT_INTERVAL_US: u64 = 2000 * TU_US;

/// Interval between root announcements.
pub const RANN_INTERVAL_US: u64 = 5000 * TU_US;

/// Initial TTL for data frames and control elements.
pub const MAX_TTL: u8 = 32;

/// At or above this many PERR receivers, send one broadcast instead of a
/// chain of unicasts.
pub const UNICAST_PERR_THRESHOLD: usize = 32;

/// At or above this many neighbors, broadcast a PREQ.
pub const UNICAST_PREQ_THRESHOLD: usize = 1;

/// At or above this many neighbors, broadcast data frames.
pub const UNICAST_DATA_THRESHOLD: usize = 1;

//! Station configuration.
//!
//! All durations are integer microseconds; lifetimes cross the wire in TUs
//! and are converted at the protocol boundary.

use std::path::Path;

use serde::Deserialize;

use crate::constants::*;
use crate::error::ConfigError;

/// Tunable parameters of a HWMP station, with the 802.11s defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct HwmpConfig {
    /// Upper bound of the random delay before the first proactive PREQ.
    #[serde(default = "default_random_start_us")]
    pub random_start_us: u64,
    /// Capacity of the pending-packet queue.
    #[serde(default = "default_max_queue_size")]
    pub max_queue_size: usize,
    /// PREQ retries before a destination is declared unreachable.
    #[serde(default = "default_max_preq_retries")]
    pub max_preq_retries: u8,
    /// Assumed one-way network traversal time; scales the retry ladder.
    #[serde(default = "default_net_traversal_time_us")]
    pub net_traversal_time_us: u64,
    #[serde(default = "default_preq_min_interval_us")]
    pub preq_min_interval_us: u64,
    #[serde(default = "default_perr_min_interval_us")]
    pub perr_min_interval_us: u64,
    /// Lifetime of proactive routing information.
    #[serde(default = "default_active_root_timeout_us")]
    pub active_root_timeout_us: u64,
    /// Lifetime of reactive routing information.
    #[serde(default = "default_active_path_timeout_us")]
    pub active_path_timeout_us: u64,
    /// Interval between proactive PREQs when acting as root.
    #[serde(default = "default_path_to_root_interval_us")]
    pub path_to_root_interval_us: u64,
    #[serde(default = "default_rann_interval_us")]
    pub rann_interval_us: u64,
    /// Initial TTL for data frames and control elements.
    #[serde(default = "default_max_ttl")]
    pub max_ttl: u8,
    #[serde(default = "default_unicast_perr_threshold")]
    pub unicast_perr_threshold: usize,
    #[serde(default = "default_unicast_preq_threshold")]
    pub unicast_preq_threshold: usize,
    #[serde(default = "default_unicast_data_threshold")]
    pub unicast_data_threshold: usize,
    /// Destination-Only flag on originated PREQs.
    #[serde(default = "default_do_flag")]
    pub do_flag: bool,
    /// Reply-and-Forward flag on originated PREQs.
    #[serde(default = "default_rf_flag")]
    pub rf_flag: bool,
}

fn default_random_start_us() -> u64 {
    RANDOM_START_US
}

fn default_max_queue_size() -> usize {
    MAX_QUEUE_SIZE
}

fn default_max_preq_retries() -> u8 {
    MAX_PREQ_RETRIES
}

fn default_net_traversal_time_us() -> u64 {
    NET_TRAVERSAL_TIME_US
}

fn default_preq_min_interval_us() -> u64 {
    PREQ_MIN_INTERVAL_US
}

fn default_perr_min_interval_us() -> u64 {
    PERR_MIN_INTERVAL_US
}

fn default_active_root_timeout_us() -> u64 {
    ACTIVE_ROOT_TIMEOUT_US
}

fn default_active_path_timeout_us() -> u64 {
    ACTIVE_PATH_TIMEOUT_US
}

fn default_path_to_root_interval_us() -> u64 {
    PATH_TO_ROOT_INTERVAL_US
}

fn default_rann_interval_us() -> u64 {
    RANN_INTERVAL_US
}

fn default_max_ttl() -> u8 {
    MAX_TTL
}

fn default_unicast_perr_threshold() -> usize {
    UNICAST_PERR_THRESHOLD
}

fn default_unicast_preq_threshold() -> usize {
    UNICAST_PREQ_THRESHOLD
}

fn default_unicast_data_threshold() -> usize {
    UNICAST_DATA_THRESHOLD
}

fn default_do_flag() -> bool {
    false
}

fn default_rf_flag() -> bool {
    true
}

impl Default for HwmpConfig {
    fn default() -> Self {
        Self {
            random_start_us: default_random_start_us(),
            max_queue_size: default_max_queue_size(),
            max_preq_retries: default_max_preq_retries(),
            net_traversal_time_us: default_net_traversal_time_us(),
            preq_min_interval_us: default_preq_min_interval_us(),
            perr_min_interval_us: default_perr_min_interval_us(),
            active_root_timeout_us: default_active_root_timeout_us(),
            active_path_timeout_us: default_active_path_timeout_us(),
            path_to_root_interval_us: default_path_to_root_interval_us(),
            rann_interval_us: default_rann_interval_us(),
            max_ttl: default_max_ttl(),
            unicast_perr_threshold: default_unicast_perr_threshold(),
            unicast_preq_threshold: default_unicast_preq_threshold(),
            unicast_data_threshold: default_unicast_data_threshold(),
            do_flag: default_do_flag(),
            rf_flag: default_rf_flag(),
        }
    }
}

impl HwmpConfig {
    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }
}

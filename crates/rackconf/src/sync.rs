//! Sync tunables - retry budget, poll intervals, datagram sizing.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Knobs for the sync engine's queue worker and light batcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// How many times a module's acknowledgement is polled before giving up.
    /// Default: 5
    #[serde(default = "SyncConfig::default_retry_limit")]
    pub retry_limit: u32,

    /// Minimum time between two acknowledgement polls for one module.
    /// Default: 200
    #[serde(default = "SyncConfig::default_check_interval_ms")]
    pub check_interval_ms: u64,

    /// Minimum time between two light update bundles.
    /// Default: 16 (one frame at 60 fps)
    #[serde(default = "SyncConfig::default_light_update_interval_ms")]
    pub light_update_interval_ms: u64,

    /// Upper bound for one outbound datagram, in bytes.
    /// Default: 32768
    #[serde(default = "SyncConfig::default_send_buffer_size")]
    pub send_buffer_size: usize,

    /// Write the module library to `state_dir/library.json` and announce it.
    /// Default: true
    #[serde(default = "SyncConfig::default_library_dump")]
    pub library_dump: bool,
}

impl SyncConfig {
    fn default_retry_limit() -> u32 {
        5
    }

    fn default_check_interval_ms() -> u64 {
        200
    }

    fn default_light_update_interval_ms() -> u64 {
        16
    }

    fn default_send_buffer_size() -> usize {
        32 * 1024
    }

    fn default_library_dump() -> bool {
        true
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_millis(self.check_interval_ms)
    }

    pub fn light_update_interval(&self) -> Duration {
        Duration::from_millis(self.light_update_interval_ms)
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            retry_limit: Self::default_retry_limit(),
            check_interval_ms: Self::default_check_interval_ms(),
            light_update_interval_ms: Self::default_light_update_interval_ms(),
            send_buffer_size: Self::default_send_buffer_size(),
            library_dump: Self::default_library_dump(),
        }
    }
}

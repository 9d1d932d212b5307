use crate::server::config::{
    default_poll_interval, default_probe_timeout, default_startup_timeout, default_stop_grace,
    default_stop_settle,
};

use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResilienceSettings {
    /// How long a freshly spawned server may take to answer (seconds)
    #[serde(default = "default_startup_timeout")]
    pub startup_timeout_secs: u64,

    /// Delay between health probes while waiting (milliseconds)
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// Per-probe HTTP timeout (milliseconds)
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_ms: u64,

    /// Wait after the graceful signal before forcing (milliseconds)
    #[serde(default = "default_stop_grace")]
    pub stop_grace_ms: u64,

    /// Wait after the forced signal before giving up (milliseconds)
    #[serde(default = "default_stop_settle")]
    pub stop_settle_ms: u64,
}

impl ResilienceSettings {
    pub fn startup_timeout(&self) -> Duration {
        Duration::from_secs(self.startup_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn stop_grace(&self) -> Duration {
        Duration::from_millis(self.stop_grace_ms)
    }

    pub fn stop_settle(&self) -> Duration {
        Duration::from_millis(self.stop_settle_ms)
    }
}

impl Default for ResilienceSettings {
    fn default() -> Self {
        Self {
            startup_timeout_secs: default_startup_timeout(),
            poll_interval_ms: default_poll_interval(),
            probe_timeout_ms: default_probe_timeout(),
            stop_grace_ms: default_stop_grace(),
            stop_settle_ms: default_stop_settle(),
        }
    }
}

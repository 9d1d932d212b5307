use crate::server::config::{default_error_hold, default_warn_hold};

use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusSettings {
    /// Minimum time a warning stays on the loading view (milliseconds)
    #[serde(default = "default_warn_hold")]
    pub warn_hold_ms: u64,

    /// Minimum time an error stays on the loading view (milliseconds)
    #[serde(default = "default_error_hold")]
    pub error_hold_ms: u64,
}

impl StatusSettings {
    pub fn warn_hold(&self) -> Duration {
        Duration::from_millis(self.warn_hold_ms)
    }

    pub fn error_hold(&self) -> Duration {
        Duration::from_millis(self.error_hold_ms)
    }
}

impl Default for StatusSettings {
    fn default() -> Self {
        Self {
            warn_hold_ms: default_warn_hold(),
            error_hold_ms: default_error_hold(),
        }
    }
}

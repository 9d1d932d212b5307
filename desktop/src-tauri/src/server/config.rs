//! Shell configuration with validation and versioning.

use crate::server::{
    LoggingSettings, ResilienceSettings, ServerError, ServerResult, ServerSettings, StatusSettings,
};

use std::panic::Location;
use std::path::Path;

use error_location::ErrorLocation;
use serde::{Deserialize, Serialize};

/// Configuration version for migration support.
/// Increment when adding new fields or changing structure.
pub const CONFIG_VERSION: u32 = 1;

const CONFIG_FILENAME: &str = "config.toml";

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 58045;
const DEFAULT_LAUNCHER: &str = "npx";
const DEFAULT_LAUNCHER_ARGS: [&str; 2] = ["--yes", "vibe-kanban"];
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_LOG_DIR: &str = "logs";
const DEFAULT_STARTUP_TIMEOUT_SECS: u64 = 45;
const DEFAULT_POLL_INTERVAL_MS: u64 = 500;
const DEFAULT_PROBE_TIMEOUT_MS: u64 = 2000;
const DEFAULT_STOP_GRACE_MS: u64 = 3500;
const DEFAULT_STOP_SETTLE_MS: u64 = 500;
const DEFAULT_WARN_HOLD_MS: u64 = 4000;
const DEFAULT_ERROR_HOLD_MS: u64 = 8000;

const MIN_PORT: u16 = 1024;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShellConfig {
    /// Config file format version
    #[serde(default = "default_version")]
    pub version: u32,

    /// Supervised server settings
    #[serde(default)]
    pub server: ServerSettings,

    /// Startup/shutdown timing
    #[serde(default)]
    pub resilience: ResilienceSettings,

    /// Loading view status holds
    #[serde(default)]
    pub status: StatusSettings,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingSettings,
}

// === Default Value Functions ===

fn default_version() -> u32 {
    CONFIG_VERSION
}
pub(crate) fn default_host() -> String {
    DEFAULT_HOST.into()
}
pub(crate) fn default_port() -> u16 {
    DEFAULT_PORT
}
pub(crate) fn default_launcher() -> String {
    DEFAULT_LAUNCHER.into()
}
pub(crate) fn default_launcher_args() -> Vec<String> {
    DEFAULT_LAUNCHER_ARGS.iter().map(|a| a.to_string()).collect()
}
pub(crate) fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.into()
}
pub(crate) fn default_log_dir() -> String {
    DEFAULT_LOG_DIR.into()
}
pub(crate) fn default_startup_timeout() -> u64 {
    DEFAULT_STARTUP_TIMEOUT_SECS
}
pub(crate) fn default_poll_interval() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}
pub(crate) fn default_probe_timeout() -> u64 {
    DEFAULT_PROBE_TIMEOUT_MS
}
pub(crate) fn default_stop_grace() -> u64 {
    DEFAULT_STOP_GRACE_MS
}
pub(crate) fn default_stop_settle() -> u64 {
    DEFAULT_STOP_SETTLE_MS
}
pub(crate) fn default_warn_hold() -> u64 {
    DEFAULT_WARN_HOLD_MS
}
pub(crate) fn default_error_hold() -> u64 {
    DEFAULT_ERROR_HOLD_MS
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            server: ServerSettings::default(),
            resilience: ResilienceSettings::default(),
            status: StatusSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

// === Configuration Operations ===

impl ShellConfig {
    /// Load config from file, creating default if not exists.
    pub fn load_or_create(data_dir: &Path) -> ServerResult<Self> {
        let config_path = data_dir.join(CONFIG_FILENAME);

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let mut config: Self =
                toml::from_str(&content).map_err(|e| ServerError::ConfigInvalid {
                    message: e.to_string(),
                    location: ErrorLocation::from(Location::caller()),
                })?;

            if config.version < CONFIG_VERSION {
                config = Self::migrate(config)?;
                config.save(data_dir)?;
            }

            config.validate()?;
            Ok(config)
        } else {
            let config = Self::default();
            config.save(data_dir)?;
            Ok(config)
        }
    }

    /// Save config to file atomically.
    ///
    /// Uses write-to-temp-then-rename pattern to prevent
    /// partial writes if the process is interrupted.
    pub fn save(&self, data_dir: &Path) -> ServerResult<()> {
        let config_path = data_dir.join(CONFIG_FILENAME);
        let content = toml::to_string_pretty(self).map_err(|e| ServerError::ConfigInvalid {
            message: e.to_string(),
            location: ErrorLocation::from(Location::caller()),
        })?;

        let temp_path = config_path.with_extension("toml.tmp");
        std::fs::write(&temp_path, &content)?;
        std::fs::rename(&temp_path, &config_path)?;

        Ok(())
    }

    /// Migrate config from older version.
    fn migrate(mut config: Self) -> ServerResult<Self> {
        // Version 0 -> 1: status holds were hard-coded before
        if config.version == 0 {
            config.status = StatusSettings::default();
            config.version = 1;
        }

        Ok(config)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> ServerResult<()> {
        if self.server.port < MIN_PORT {
            return Err(ServerError::ConfigInvalid {
                message: format!("Port must be >= {MIN_PORT} (unprivileged)"),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        // The shell only ever talks to a server on this machine
        if self.server.host != DEFAULT_HOST && self.server.host != "localhost" {
            return Err(ServerError::ConfigInvalid {
                message: format!("Host must be {DEFAULT_HOST} or localhost for security"),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        if self.server.launcher.trim().is_empty() {
            return Err(ServerError::ConfigInvalid {
                message: "Launcher command must not be empty".into(),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        if self.resilience.startup_timeout_secs == 0 {
            return Err(ServerError::ConfigInvalid {
                message: "Startup timeout must be > 0".into(),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        if self.resilience.poll_interval_ms == 0 || self.resilience.probe_timeout_ms == 0 {
            return Err(ServerError::ConfigInvalid {
                message: "Poll interval and probe timeout must be > 0".into(),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        Ok(())
    }
}

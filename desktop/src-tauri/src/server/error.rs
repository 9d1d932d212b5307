use std::panic::Location;
use std::path::PathBuf;

use error_location::ErrorLocation;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Failed to create data directory at {path}: {source} {location}")]
    DataDirCreation {
        path: PathBuf,
        #[source]
        source: std::io::Error,
        location: ErrorLocation,
    },

    #[error("Configuration invalid: {message} {location}")]
    ConfigInvalid {
        message: String,
        location: ErrorLocation,
    },

    #[error("Launcher '{name}' not found in {searched} director(ies) {location}")]
    LauncherNotFound {
        name: String,
        searched: usize,
        location: ErrorLocation,
    },

    #[error("Failed to spawn server process: {source} {location}")]
    ProcessSpawn {
        #[source]
        source: std::io::Error,
        location: ErrorLocation,
    },

    #[error("Server process exited before becoming ready ({reason}) {location}")]
    PrematureExit {
        reason: String,
        location: ErrorLocation,
    },

    #[error("Server failed to become ready within {timeout_secs}s {location}")]
    StartupTimeout {
        timeout_secs: u64,
        location: ErrorLocation,
    },

    #[error("A server start is already in progress {location}")]
    StartupInProgress { location: ErrorLocation },

    #[error("IO error: {source} {location}")]
    Io {
        #[source]
        source: std::io::Error,
        location: ErrorLocation,
    },
}

impl ServerError {
    /// Whether this error is recoverable via retry
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::StartupTimeout { .. } | Self::PrematureExit { .. } | Self::StartupInProgress { .. }
        )
    }

    pub fn recovery_hint(&self) -> &'static str {
        match self {
            Self::LauncherNotFound { .. } => {
                "Node.js does not appear to be installed. \
                   Install Node.js (which provides npx) and press Retry."
            }
            Self::ProcessSpawn { .. } => {
                "The server launcher could not be started. \
                   Check that it is executable and press Retry."
            }
            Self::PrematureExit { .. } => {
                "The server stopped while starting. \
                   Check the logs for its output and press Retry."
            }
            Self::StartupTimeout { .. } => {
                "The server is taking too long to start. \
                   Check your network connection and press Retry."
            }
            Self::StartupInProgress { .. } => "The server is already starting. Please wait.",
            Self::ConfigInvalid { .. } => {
                "Configuration file has invalid settings. \
                   Check the logs for details or delete the config file to use defaults."
            }
            Self::DataDirCreation { .. } => {
                "Unable to create application data directory. \
                   Check file permissions or available disk space."
            }
            Self::Io { .. } => "An unexpected error occurred. Please check the logs for details.",
        }
    }

    /// Creates DataDirCreation error at caller location.
    #[track_caller]
    pub fn data_dir_creation(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::DataDirCreation {
            path: path.into(),
            source,
            location: ErrorLocation::from(Location::caller()),
        }
    }

    /// Creates LauncherNotFound error at caller location.
    #[track_caller]
    pub fn launcher_not_found(name: impl Into<String>, searched: usize) -> Self {
        Self::LauncherNotFound {
            name: name.into(),
            searched,
            location: ErrorLocation::from(Location::caller()),
        }
    }

    /// Creates ProcessSpawn error at caller location.
    #[track_caller]
    pub fn process_spawn(source: std::io::Error) -> Self {
        Self::ProcessSpawn {
            source,
            location: ErrorLocation::from(Location::caller()),
        }
    }

    /// Creates PrematureExit error at caller location.
    #[track_caller]
    pub fn premature_exit(reason: impl Into<String>) -> Self {
        Self::PrematureExit {
            reason: reason.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    /// Creates StartupTimeout error at caller location.
    #[track_caller]
    pub fn startup_timeout(timeout_secs: u64) -> Self {
        Self::StartupTimeout {
            timeout_secs,
            location: ErrorLocation::from(Location::caller()),
        }
    }

    /// Creates StartupInProgress error at caller location.
    #[track_caller]
    pub fn startup_in_progress() -> Self {
        Self::StartupInProgress {
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

impl From<std::io::Error> for ServerError {
    #[track_caller]
    fn from(source: std::io::Error) -> Self {
        Self::Io {
            source,
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

pub type Result<T> = std::result::Result<T, ServerError>;

use crate::server::config::{default_host, default_launcher, default_launcher_args, default_port};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Host the server binds to (always loopback)
    #[serde(default = "default_host")]
    pub host: String,

    /// Fixed port pinned through the server's environment
    #[serde(default = "default_port")]
    pub port: u16,

    /// Launcher command resolved on disk (package runner)
    #[serde(default = "default_launcher")]
    pub launcher: String,

    /// Arguments passed to the launcher
    #[serde(default = "default_launcher_args")]
    pub args: Vec<String>,

    /// Extra directories searched for the launcher after `PATH` and the
    /// usual install locations
    #[serde(default)]
    pub search_dirs: Vec<String>,
}

impl ServerSettings {
    /// Base URL of the web UI, also used as the health endpoint.
    pub fn url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            launcher: default_launcher(),
            args: default_launcher_args(),
            search_dirs: Vec::new(),
        }
    }
}

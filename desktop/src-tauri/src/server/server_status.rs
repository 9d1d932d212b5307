use serde::Serialize;

/// Snapshot of the shell for the web layer.
#[derive(Debug, Clone, Serialize)]
pub struct ShellStatus {
    pub state: String,
    pub url: String,
    pub pid: Option<u32>,
    pub started_by_us: bool,
    pub error: Option<String>,
    pub recovery_hint: Option<String>,
}

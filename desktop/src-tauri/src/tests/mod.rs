mod resolver;
mod status_channel;

use crate::server::{HealthProbe, ShellConfig, ShutdownChoice, ShutdownPrompt};
use crate::status::{StatusMessage, StatusSurface, SurfaceError};

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, mpsc};

use async_trait::async_trait;

// =============================================================================
// Status surface
// =============================================================================

/// Records every status pushed to it.
pub(crate) struct RecordingSurface {
    available: AtomicBool,
    showing_loading: AtomicBool,
    failing: AtomicBool,
    delivered: Mutex<Vec<StatusMessage>>,
}

impl RecordingSurface {
    pub(crate) fn new() -> Self {
        Self {
            available: AtomicBool::new(true),
            showing_loading: AtomicBool::new(true),
            failing: AtomicBool::new(false),
            delivered: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub(crate) fn set_showing_loading(&self, showing: bool) {
        self.showing_loading.store(showing, Ordering::SeqCst);
    }

    pub(crate) fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub(crate) fn delivered(&self) -> Vec<StatusMessage> {
        self.delivered.lock().unwrap().clone()
    }

    pub(crate) fn titles(&self) -> Vec<String> {
        self.delivered().into_iter().map(|m| m.title).collect()
    }
}

impl StatusSurface for RecordingSurface {
    fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    fn is_showing_loading(&self) -> bool {
        self.showing_loading.load(Ordering::SeqCst)
    }

    fn push(&self, status: &StatusMessage) -> Result<(), SurfaceError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(SurfaceError::Script("view crashed".into()));
        }
        self.delivered.lock().unwrap().push(status.clone());
        Ok(())
    }
}

// =============================================================================
// Health probes
// =============================================================================

/// Answers from a fixed script; the last answer repeats forever.
pub(crate) struct ScriptedProbe {
    answers: Mutex<VecDeque<bool>>,
    last: AtomicBool,
    calls: AtomicUsize,
}

impl ScriptedProbe {
    pub(crate) fn new(answers: &[bool]) -> Self {
        Self {
            answers: Mutex::new(answers.iter().copied().collect()),
            last: AtomicBool::new(answers.last().copied().unwrap_or(false)),
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn always(reachable: bool) -> Self {
        Self::new(&[reachable])
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HealthProbe for ScriptedProbe {
    async fn probe(&self) -> bool {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.answers
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.last.load(Ordering::SeqCst))
    }
}

/// Reachable once a marker file exists.
pub(crate) struct MarkerProbe {
    marker: PathBuf,
}

impl MarkerProbe {
    pub(crate) fn new(marker: PathBuf) -> Self {
        Self { marker }
    }
}

#[async_trait]
impl HealthProbe for MarkerProbe {
    async fn probe(&self) -> bool {
        self.marker.exists()
    }
}

// =============================================================================
// Exit prompts
// =============================================================================

/// Returns a fixed answer and counts how often it was asked.
pub(crate) struct FixedPrompt {
    choice: ShutdownChoice,
    asked: AtomicUsize,
}

impl FixedPrompt {
    pub(crate) fn new(choice: ShutdownChoice) -> Self {
        Self {
            choice,
            asked: AtomicUsize::new(0),
        }
    }

    pub(crate) fn asked(&self) -> usize {
        self.asked.load(Ordering::SeqCst)
    }
}

impl ShutdownPrompt for FixedPrompt {
    fn choose(&self) -> ShutdownChoice {
        self.asked.fetch_add(1, Ordering::SeqCst);
        self.choice
    }
}

/// Blocks until the test sends an answer.
pub(crate) struct BlockingPrompt {
    answer: Mutex<mpsc::Receiver<ShutdownChoice>>,
}

impl BlockingPrompt {
    pub(crate) fn new() -> (Self, mpsc::Sender<ShutdownChoice>) {
        let (tx, rx) = mpsc::channel();
        (
            Self {
                answer: Mutex::new(rx),
            },
            tx,
        )
    }
}

impl ShutdownPrompt for BlockingPrompt {
    fn choose(&self) -> ShutdownChoice {
        self.answer
            .lock()
            .unwrap()
            .recv()
            .unwrap_or(ShutdownChoice::Cancel)
    }
}

// =============================================================================
// Config and launchers
// =============================================================================

/// Fast timings, launcher looked up by `launcher` in `dir`.
pub(crate) fn test_config(dir: &Path, launcher: &str) -> ShellConfig {
    let mut config = ShellConfig::default();
    config.server.launcher = launcher.into();
    config.server.args = Vec::new();
    config.server.search_dirs = vec![dir.to_string_lossy().into_owned()];
    config.resilience.startup_timeout_secs = 5;
    config.resilience.poll_interval_ms = 50;
    config.resilience.stop_grace_ms = 1000;
    config.resilience.stop_settle_ms = 300;
    config
}

/// Config whose launcher is `/bin/sh` (linked into `dir` as `name`) running
/// `script`.
#[cfg(unix)]
pub(crate) fn sh_launcher_config(dir: &Path, name: &str, script: &str) -> ShellConfig {
    std::os::unix::fs::symlink("/bin/sh", dir.join(name)).unwrap();

    let mut config = test_config(dir, name);
    config.server.args = vec!["-c".into(), script.into()];
    config
}

/// Whether a process with `pid` still exists.
#[cfg(unix)]
pub(crate) fn process_exists(pid: u32) -> bool {
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    if kill(Pid::from_raw(pid as i32), None).is_err() {
        return false;
    }

    // Zombies have exited and only wait to be reaped.
    match std::fs::read_to_string(format!("/proc/{pid}/stat")) {
        Ok(stat) => {
            stat.rsplit_once(')')
                .and_then(|(_, rest)| rest.trim_start().chars().next())
                != Some('Z')
        }
        Err(_) => true,
    }
}

// =============================================================================
// Supervisor harness
// =============================================================================

pub(crate) struct Harness {
    pub(crate) supervisor: std::sync::Arc<crate::server::ServerSupervisor>,
    pub(crate) surface: std::sync::Arc<RecordingSurface>,
}

/// Supervisor wired to a recording surface whose loading view is ready.
pub(crate) fn harness(
    config: ShellConfig,
    probe: std::sync::Arc<dyn HealthProbe>,
) -> Harness {
    use crate::server::ServerSupervisor;
    use crate::status::StatusChannel;
    use std::sync::Arc;

    let surface = Arc::new(RecordingSurface::new());
    let status = StatusChannel::new(
        surface.clone(),
        &config.status,
        tokio::runtime::Handle::current(),
    );
    status.mark_ready();

    Harness {
        supervisor: Arc::new(ServerSupervisor::with_prober(config, status, probe)),
        surface,
    }
}

/// Launch a `/bin/sh` server in `dir` that becomes healthy right away.
#[cfg(unix)]
pub(crate) async fn start_owned_server(dir: &Path) -> (Harness, u32) {
    use crate::server::StartOutcome;
    use std::sync::Arc;

    let marker = dir.join("healthy");
    let config = sh_launcher_config(
        dir,
        "vk-owned-server",
        &format!("touch '{}'; sleep 30", marker.display()),
    );
    let harness = harness(config, Arc::new(MarkerProbe::new(marker)));

    match harness.supervisor.ensure_server_running().await {
        Ok(StartOutcome::Started { pid }) => (harness, pid),
        other => panic!("expected an owned server, got {other:?}"),
    }
}

//! Server process lifecycle: detect, launch, wait for health, stop.

use crate::server::flag_guard::AtomicFlagGuard;
use crate::server::output::{OutputRouter, OutputStream, spawn_output_reader};
use crate::server::process_tree::{StopReport, isolate_process_group, stop_gracefully, terminate_tree};
use crate::server::server_handle::{ExitInfo, Liveness, ServerHandle, wait_for_exit};
use crate::server::shutdown::{ShutdownChoice, ShutdownGate, ShutdownOutcome, ShutdownPrompt};
use crate::server::{
    HealthProbe, HttpHealthProber, ServerError, ServerResult, ShellConfig, SupervisorState, resolver,
};
use crate::status::{StatusChannel, StatusMessage};

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use tauri::async_runtime::Mutex;
use tokio::process::Command;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

pub const CHECKING_TITLE: &str = "Checking for a running server…";
pub const CONNECTING_TITLE: &str = "Connecting to Vibe Kanban…";
pub const STARTING_TITLE: &str = "Starting Vibe Kanban…";
pub const READY_TITLE: &str = "Vibe Kanban is ready";
pub const FAILED_TITLE: &str = "Unable to start Vibe Kanban";

/// How `ensure_server_running` found the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// Something was already answering on the server address. Not ours.
    AlreadyRunning,
    /// We launched the server and it became healthy.
    Started { pid: u32 },
}

/// The first thing to happen after a spawn.
enum StartupEvent {
    HealthSucceeded,
    HealthTimedOut,
    ProcessExited(ExitInfo),
    ProcessErrored(String),
}

impl From<Liveness> for StartupEvent {
    fn from(liveness: Liveness) -> Self {
        match liveness {
            Liveness::Exited(info) => Self::ProcessExited(info),
            Liveness::Failed(reason) => Self::ProcessErrored(reason),
            Liveness::Alive => Self::ProcessErrored("process watcher stopped".into()),
        }
    }
}

/// Owns the supervised server process and everything known about it.
///
/// One per application. All mutation goes through its methods.
pub struct ServerSupervisor {
    config: ShellConfig,
    status: StatusChannel,
    prober: Arc<dyn HealthProbe>,
    launcher_dirs: Vec<PathBuf>,
    handle: Mutex<Option<ServerHandle>>,
    starting: AtomicBool,
    shutdown_gate: ShutdownGate,
    state_tx: watch::Sender<SupervisorState>,
    state_rx: watch::Receiver<SupervisorState>,
}

impl ServerSupervisor {
    /// Create a supervisor probing the configured address over HTTP.
    pub fn new(config: ShellConfig, status: StatusChannel) -> Self {
        let prober = Arc::new(HttpHealthProber::new(
            config.server.url(),
            config.resilience.probe_timeout(),
        ));
        Self::with_prober(config, status, prober)
    }

    pub fn with_prober(
        config: ShellConfig,
        status: StatusChannel,
        prober: Arc<dyn HealthProbe>,
    ) -> Self {
        let (state_tx, state_rx) = watch::channel(SupervisorState::Idle);

        let mut launcher_dirs = resolver::well_known_dirs();
        launcher_dirs.extend(config.server.search_dirs.iter().map(PathBuf::from));

        Self {
            config,
            status,
            prober,
            launcher_dirs,
            handle: Mutex::new(None),
            starting: AtomicBool::new(false),
            shutdown_gate: ShutdownGate::default(),
            state_tx,
            state_rx,
        }
    }

    /// Make sure a server answers on the configured address, launching one if
    /// nothing does.
    ///
    /// Every failure is also reported on the status channel. A call made while
    /// another is in flight fails with `StartupInProgress` and touches nothing.
    pub async fn ensure_server_running(&self) -> ServerResult<StartOutcome> {
        let Some(_starting) = AtomicFlagGuard::try_set(&self.starting) else {
            warn!("Server start requested while another start is in flight");
            return Err(ServerError::startup_in_progress());
        };

        let url = self.server_url();

        self.set_state(SupervisorState::Checking);
        self.status
            .send(StatusMessage::info(CHECKING_TITLE).with_detail(url.clone()));

        if self.prober.probe().await {
            let owned = self.owned_live_pid().await;
            match owned {
                Some(pid) => info!("Our server (pid {pid}) is answering on {url}"),
                None => info!("Found an existing server on {url}, not starting another"),
            }

            self.set_state(match owned {
                Some(_) => SupervisorState::Ready,
                None => SupervisorState::AlreadyRunning,
            });
            self.status
                .send(StatusMessage::info(CONNECTING_TITLE).with_detail(url));

            return Ok(match owned {
                Some(pid) => StartOutcome::Started { pid },
                None => StartOutcome::AlreadyRunning,
            });
        }

        // A process of ours that stopped answering is replaced, never doubled.
        if self.handle.lock().await.is_some() {
            warn!("Previous server process is unresponsive, stopping it");
            self.stop_server_process().await;
        }

        self.set_state(SupervisorState::Spawning);
        self.status.send(
            StatusMessage::info(STARTING_TITLE)
                .with_detail(format!("Launching {}", self.config.server.launcher)),
        );

        let launcher_name = &self.config.server.launcher;
        let Some(launcher) = resolver::resolve(launcher_name, &self.launcher_dirs) else {
            let searched = resolver::candidate_dirs(
                std::env::var_os("PATH").as_deref(),
                &self.launcher_dirs,
            )
            .len();
            let err = ServerError::launcher_not_found(launcher_name.clone(), searched);
            self.report_failure(
                &err,
                format!("Could not find '{launcher_name}' on PATH or in common install locations."),
            );
            return Err(err);
        };

        info!("Launching {} {:?}", launcher.display(), self.config.server.args);

        let mut cmd = Command::new(&launcher);
        cmd.args(&self.config.server.args)
            .env("PORT", self.config.server.port.to_string())
            .env("HOST", &self.config.server.host)
            .env("npm_config_yes", "true")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        isolate_process_group(&mut cmd);

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                let detail = format!("Failed to launch {}: {e}", launcher.display());
                let err = ServerError::process_spawn(e);
                self.report_failure(&err, detail);
                return Err(err);
            }
        };

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let Some(handle) = ServerHandle::watch_child(child) else {
            let err = ServerError::premature_exit("exit code: unknown");
            self.report_failure(&err, "The server process exited before it was ready (exit code: unknown)");
            return Err(err);
        };

        let pid = handle.pid();
        info!("Server process spawned (pid {pid})");

        let router = Arc::new(OutputRouter::new());
        if let Some(stdout) = stdout {
            spawn_output_reader(stdout, OutputStream::Stdout, router.clone(), self.status.clone());
        }
        if let Some(stderr) = stderr {
            spawn_output_reader(stderr, OutputStream::Stderr, router.clone(), self.status.clone());
        }

        let mut exit_rx = handle.subscribe();
        *self.handle.lock().await = Some(handle);
        self.set_state(SupervisorState::Starting);

        let resilience = &self.config.resilience;
        let event = tokio::select! {
            reachable = self.prober.wait_until_reachable(
                resilience.startup_timeout(),
                resilience.poll_interval(),
            ) => if reachable {
                StartupEvent::HealthSucceeded
            } else {
                StartupEvent::HealthTimedOut
            },
            liveness = wait_for_exit(&mut exit_rx) => StartupEvent::from(liveness),
        };

        // Late output must not replace the outcome on the loading view.
        router.close();

        match event {
            StartupEvent::HealthSucceeded => {
                info!("Server ready on {url} (pid {pid})");
                self.set_state(SupervisorState::Ready);
                self.status
                    .send(StatusMessage::info(READY_TITLE).with_detail(url));
                Ok(StartOutcome::Started { pid })
            }
            StartupEvent::ProcessExited(info) => {
                self.handle.lock().await.take();
                let err = ServerError::premature_exit(info.to_string());
                self.report_failure(
                    &err,
                    format!("The server process exited before it was ready ({info})"),
                );
                Err(err)
            }
            StartupEvent::ProcessErrored(reason) => {
                self.handle.lock().await.take();
                let detail = format!("The server process failed: {reason}");
                let err = ServerError::premature_exit(reason);
                self.report_failure(&err, detail);
                Err(err)
            }
            StartupEvent::HealthTimedOut => {
                let timeout_secs = resilience.startup_timeout().as_secs();
                let err = ServerError::startup_timeout(timeout_secs);
                self.report_failure(
                    &err,
                    format!("The server did not respond within {timeout_secs} seconds."),
                );

                warn!("Forcing termination of unresponsive server (pid {pid})");
                terminate_tree(pid, true).await;
                let handle = self.handle.lock().await.take();
                if let Some(handle) = handle {
                    let mut rx = handle.subscribe();
                    if tokio::time::timeout(resilience.stop_settle(), wait_for_exit(&mut rx))
                        .await
                        .is_err()
                    {
                        warn!("Server (pid {pid}) not confirmed dead after forced termination");
                    }
                }
                Err(err)
            }
        }
    }

    /// Run the graceful-then-forced stop sequence on our process, if any.
    ///
    /// The handle is cleared whatever the outcome.
    pub async fn stop_server_process(&self) -> StopReport {
        let Some(handle) = self.handle.lock().await.take() else {
            debug!("No server process to stop");
            return StopReport::AlreadyExited;
        };

        let pid = handle.pid();
        self.set_state(SupervisorState::Stopping);
        info!("Stopping server (pid {pid})");

        let mut liveness = handle.subscribe();
        let resilience = &self.config.resilience;
        let report = stop_gracefully(
            pid,
            &mut liveness,
            resilience.stop_grace(),
            resilience.stop_settle(),
        )
        .await;

        match report {
            StopReport::Unconfirmed => error!("Server (pid {pid}) may still be running"),
            other => info!("Server (pid {pid}) stopped: {other:?}"),
        }

        self.set_state(SupervisorState::Idle);
        report
    }

    /// Forget our process without signalling it.
    pub async fn detach(&self) {
        if let Some(handle) = self.handle.lock().await.take() {
            info!("Leaving server (pid {}) running", handle.pid());
        }
    }

    /// Decide what happens to the server when the application exits.
    pub async fn shutdown(&self, prompt: Arc<dyn ShutdownPrompt>) -> ShutdownOutcome {
        if self.shutdown_gate.is_decided() {
            return ShutdownOutcome::Exit;
        }

        let owned_alive = self
            .handle
            .lock()
            .await
            .as_ref()
            .is_some_and(|handle| handle.started_by_us() && handle.is_alive());

        if !owned_alive {
            self.detach().await;
            self.shutdown_gate.mark_decided();
            return ShutdownOutcome::Exit;
        }

        let Some(_prompting) = self.shutdown_gate.try_begin_prompt() else {
            debug!("Exit prompt already open");
            return ShutdownOutcome::PromptInFlight;
        };

        let choice = match tokio::task::spawn_blocking(move || prompt.choose()).await {
            Ok(choice) => choice,
            Err(e) => {
                error!("Exit prompt failed: {e}");
                ShutdownChoice::Cancel
            }
        };
        info!("Exit prompt answered: {choice:?}");

        match choice {
            ShutdownChoice::StopServer => {
                self.stop_server_process().await;
                self.shutdown_gate.mark_decided();
                ShutdownOutcome::Exit
            }
            ShutdownChoice::LeaveRunning => {
                self.detach().await;
                self.shutdown_gate.mark_decided();
                ShutdownOutcome::Exit
            }
            ShutdownChoice::Cancel => {
                // A start still in progress reports its own outcome.
                if self.state() != SupervisorState::Starting {
                    self.set_state(SupervisorState::Connected);
                }
                ShutdownOutcome::Stay
            }
        }
    }

    /// Whether the application may exit without asking `shutdown` first.
    ///
    /// Never blocks; a busy handle counts as "ask first".
    pub fn exit_allowed(&self) -> bool {
        if self.shutdown_gate.is_decided() {
            return true;
        }
        match self.handle.try_lock() {
            Ok(guard) => guard.as_ref().is_none_or(|handle| !handle.is_alive()),
            Err(_) => false,
        }
    }

    /// Stop the server only if this instance launched it. No prompt.
    pub async fn stop_owned(&self) -> Option<StopReport> {
        let owned = self.handle.lock().await.is_some();
        self.shutdown_gate.mark_decided();
        if owned {
            Some(self.stop_server_process().await)
        } else {
            None
        }
    }

    /// Whether the exit prompt is currently waiting on the user.
    pub fn exit_prompt_open(&self) -> bool {
        self.shutdown_gate.is_prompting()
    }

    /// The web UI replaced the loading view.
    pub fn mark_connected(&self) {
        self.set_state(SupervisorState::Connected);
    }

    pub fn state(&self) -> SupervisorState {
        self.state_rx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SupervisorState> {
        self.state_rx.clone()
    }

    pub async fn server_pid(&self) -> Option<u32> {
        self.handle.lock().await.as_ref().map(ServerHandle::pid)
    }

    pub async fn started_by_us(&self) -> bool {
        self.handle
            .lock()
            .await
            .as_ref()
            .is_some_and(ServerHandle::started_by_us)
    }

    pub fn server_url(&self) -> String {
        self.config.server.url()
    }

    pub fn status(&self) -> &StatusChannel {
        &self.status
    }

    pub fn config(&self) -> &ShellConfig {
        &self.config
    }

    async fn owned_live_pid(&self) -> Option<u32> {
        self.handle
            .lock()
            .await
            .as_ref()
            .filter(|handle| handle.is_alive())
            .map(ServerHandle::pid)
    }

    fn report_failure(&self, err: &ServerError, detail: impl Into<String>) {
        error!("Server start failed: {err}");
        self.set_state(SupervisorState::Failed {
            error: err.to_string(),
            recovery_hint: err.recovery_hint().to_string(),
        });
        self.status.send(
            StatusMessage::error(FAILED_TITLE)
                .with_detail(detail)
                .with_sub_detail(err.recovery_hint()),
        );
    }

    fn set_state(&self, state: SupervisorState) {
        debug!("Supervisor state: {state:?}");
        self.state_tx.send_replace(state);
    }
}

use std::fmt;
use std::process::ExitStatus;

use tokio::process::Child;
use tokio::sync::watch;
use tracing::info;

/// How a supervised process ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExitInfo {
    pub code: Option<i32>,
    pub signal: Option<i32>,
}

impl From<ExitStatus> for ExitInfo {
    fn from(status: ExitStatus) -> Self {
        #[cfg(unix)]
        let signal = {
            use std::os::unix::process::ExitStatusExt;
            status.signal()
        };
        #[cfg(not(unix))]
        let signal = None;

        Self {
            code: status.code(),
            signal,
        }
    }
}

impl fmt::Display for ExitInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.code, self.signal) {
            (Some(code), _) => write!(f, "exit code: {code}"),
            (None, Some(signal)) => write!(f, "terminated by signal {signal}"),
            (None, None) => write!(f, "exit code: unknown"),
        }
    }
}

/// Whether the supervised process is still running.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Liveness {
    Alive,
    Exited(ExitInfo),
    /// Waiting on the process failed; treated as gone.
    Failed(String),
}

impl Liveness {
    pub fn is_alive(&self) -> bool {
        matches!(self, Self::Alive)
    }
}

/// A server process spawned by this instance.
///
/// Only a spawn creates a handle, so `started_by_us` is set from the start. A
/// server that was already running when we looked never gets one.
#[derive(Debug)]
pub struct ServerHandle {
    pid: u32,
    started_by_us: bool,
    liveness: watch::Receiver<Liveness>,
}

impl ServerHandle {
    /// Take ownership of `child` and watch it until it exits.
    ///
    /// The watcher task reaps the process, so no zombie is left behind.
    /// Returns `None` if the child already has no PID.
    pub fn watch_child(mut child: Child) -> Option<Self> {
        let pid = child.id()?;
        let (tx, rx) = watch::channel(Liveness::Alive);

        tokio::spawn(async move {
            let liveness = match child.wait().await {
                Ok(status) => Liveness::Exited(ExitInfo::from(status)),
                Err(e) => Liveness::Failed(e.to_string()),
            };
            info!("Server process {pid} ended: {liveness:?}");
            let _ = tx.send(liveness);
        });

        Some(Self {
            pid,
            started_by_us: true,
            liveness: rx,
        })
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn started_by_us(&self) -> bool {
        self.started_by_us
    }

    pub fn liveness(&self) -> Liveness {
        self.liveness.borrow().clone()
    }

    pub fn is_alive(&self) -> bool {
        self.liveness.borrow().is_alive()
    }

    /// A fresh receiver for exit notifications.
    pub fn subscribe(&self) -> watch::Receiver<Liveness> {
        self.liveness.clone()
    }
}

/// Resolve once `liveness` leaves `Alive`.
pub async fn wait_for_exit(liveness: &mut watch::Receiver<Liveness>) -> Liveness {
    match liveness.wait_for(|l| !l.is_alive()).await {
        Ok(state) => state.clone(),
        Err(_) => Liveness::Failed("process watcher went away".into()),
    }
}

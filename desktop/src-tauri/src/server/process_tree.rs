//! Graduated termination of a process and its descendants.
//!
//! The launcher (`npx`) starts the real server as a child of its own, so
//! signalling only the launcher PID would orphan the server. On Unix the
//! launcher is made a session and group leader at spawn and the whole group is
//! signalled. On Windows `taskkill /T` walks the tree.

use crate::server::server_handle::{Liveness, wait_for_exit};

use std::time::Duration;

use tokio::process::Command;
use tokio::sync::watch;
use tokio::time::timeout;
use tracing::{debug, info, warn};

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

/// How a stop sequence ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReport {
    /// Nothing to do, the process was already gone.
    AlreadyExited,
    /// Exited within the grace window after the graceful signal.
    Graceful,
    /// Exited after the forced signal.
    Forced,
    /// Still not confirmed dead after the forced signal and settle window.
    Unconfirmed,
}

/// Make a command's child lead its own process group.
pub fn isolate_process_group(cmd: &mut Command) {
    #[cfg(unix)]
    unsafe {
        cmd.pre_exec(|| {
            libc::setsid();
            Ok(())
        });
    }

    #[cfg(windows)]
    {
        cmd.creation_flags(CREATE_NO_WINDOW);
    }
}

/// Signal `pid` and its descendants. Best effort; never fails.
///
/// `force` selects SIGKILL (Unix) or `/F` (Windows).
pub async fn terminate_tree(pid: u32, force: bool) {
    #[cfg(unix)]
    terminate_unix(pid, force);

    #[cfg(windows)]
    terminate_windows(pid, force).await;
}

#[cfg(unix)]
fn terminate_unix(pid: u32, force: bool) {
    use nix::errno::Errno;
    use nix::sys::signal::{Signal, kill, killpg};
    use nix::unistd::Pid;

    let signal = if force { Signal::SIGKILL } else { Signal::SIGTERM };

    // 0 and negative values address our own group or every process
    let raw = match i32::try_from(pid) {
        Ok(raw) if raw > 0 => raw,
        _ => {
            warn!("Refusing to signal invalid pid {pid}");
            return;
        }
    };
    let target = Pid::from_raw(raw);

    match killpg(target, signal) {
        Ok(()) => {
            info!("Sent {signal:?} to process group {pid}");
            return;
        }
        Err(e) => debug!("Group signal to {pid} failed ({e}), signalling process directly"),
    }

    match kill(target, signal) {
        Ok(()) => info!("Sent {signal:?} to process {pid}"),
        Err(Errno::ESRCH) => debug!("Process {pid} already exited"),
        Err(e) => warn!("Failed to send {signal:?} to process {pid}: {e}"),
    }
}

#[cfg(windows)]
async fn terminate_windows(pid: u32, force: bool) {
    let pid_arg = pid.to_string();
    let mut args = vec!["/PID", pid_arg.as_str(), "/T"];
    if force {
        args.push("/F");
    }

    let mut cmd = Command::new("taskkill");
    cmd.args(&args).creation_flags(CREATE_NO_WINDOW);

    match cmd.output().await {
        Ok(output) if output.status.success() => {
            info!("taskkill {} succeeded for {pid}", args.join(" "))
        }
        Ok(output) => debug!(
            "taskkill for {pid} exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        ),
        Err(e) => warn!("Failed to run taskkill for {pid}: {e}"),
    }
}

/// Graceful terminate, wait `grace`, then force and wait `settle`.
///
/// Always returns; a process that survives both windows is reported as
/// `Unconfirmed` rather than waited on forever.
pub async fn stop_gracefully(
    pid: u32,
    liveness: &mut watch::Receiver<Liveness>,
    grace: Duration,
    settle: Duration,
) -> StopReport {
    if !liveness.borrow().is_alive() {
        return StopReport::AlreadyExited;
    }

    terminate_tree(pid, false).await;
    if timeout(grace, wait_for_exit(liveness)).await.is_ok() {
        return StopReport::Graceful;
    }

    warn!("Process {pid} still running after {grace:?}, forcing termination");
    terminate_tree(pid, true).await;
    if timeout(settle, wait_for_exit(liveness)).await.is_ok() {
        StopReport::Forced
    } else {
        warn!("Process {pid} not confirmed dead after {settle:?}");
        StopReport::Unconfirmed
    }
}

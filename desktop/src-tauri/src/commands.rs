//! Tauri IPC commands for the loading view.

use crate::presentation::WebviewStatusSurface;
use crate::server::{ServerSupervisor, ShellStatus, StartOutcome, SupervisorState};

use std::sync::Arc;

use log::{error, info};
use tauri::State;

/// Current supervisor state for the web layer.
#[tauri::command]
pub async fn get_shell_status(
    supervisor: State<'_, Arc<ServerSupervisor>>,
) -> Result<ShellStatus, String> {
    let state = supervisor.state();
    let pid = supervisor.server_pid().await;
    let started_by_us = supervisor.started_by_us().await;

    Ok(build_shell_status(
        &state,
        supervisor.server_url(),
        pid,
        started_by_us,
    ))
}

/// Fired by the loading page once after its first render.
#[tauri::command]
pub fn loading_view_ready(
    supervisor: State<'_, Arc<ServerSupervisor>>,
    surface: State<'_, Arc<WebviewStatusSurface>>,
) {
    info!("Loading view ready");
    surface.set_showing_loading(true);
    supervisor.status().mark_ready();
}

/// Try to start the server again after a failure, without restarting the app.
///
/// Returns once the attempt is under way; progress arrives as status updates.
#[tauri::command]
pub fn retry_server_start(
    supervisor: State<'_, Arc<ServerSupervisor>>,
    surface: State<'_, Arc<WebviewStatusSurface>>,
) -> Result<(), String> {
    if matches!(
        supervisor.state(),
        SupervisorState::Checking | SupervisorState::Spawning | SupervisorState::Starting
    ) {
        return Err("A server start is already in progress".into());
    }

    info!("Retrying server start");
    surface.set_showing_loading(true);
    let status = supervisor.status();
    status.reset();
    status.mark_ready();

    spawn_server_start(supervisor.inner().clone(), surface.inner().clone());
    Ok(())
}

/// Run `ensure_server_running` in the background and show the web UI on success.
pub fn spawn_server_start(
    supervisor: Arc<ServerSupervisor>,
    surface: Arc<WebviewStatusSurface>,
) {
    tauri::async_runtime::spawn(async move {
        match supervisor.ensure_server_running().await {
            Ok(outcome) => {
                match outcome {
                    StartOutcome::AlreadyRunning => info!("Using existing server"),
                    StartOutcome::Started { pid } => info!("Server started (pid {pid})"),
                }
                if let Err(e) = surface.navigate(&supervisor.server_url()) {
                    error!("Failed to show the web UI: {e}");
                }
            }
            // The loading view keeps showing the failure; nothing else to do.
            Err(e) => error!("Server start failed: {e}\n\nHint: {}", e.recovery_hint()),
        }
    });
}

/// Converts supervisor state to the status shape the web layer reads.
pub fn build_shell_status(
    state: &SupervisorState,
    url: String,
    pid: Option<u32>,
    started_by_us: bool,
) -> ShellStatus {
    let (state_str, error, recovery_hint) = match state {
        SupervisorState::Idle => ("idle", None, None),
        SupervisorState::Checking => ("checking", None, None),
        SupervisorState::AlreadyRunning => ("already_running", None, None),
        SupervisorState::Spawning => ("spawning", None, None),
        SupervisorState::Starting => ("starting", None, None),
        SupervisorState::Ready => ("ready", None, None),
        SupervisorState::Connected => ("connected", None, None),
        SupervisorState::Stopping => ("stopping", None, None),
        SupervisorState::Failed {
            error,
            recovery_hint,
        } => ("failed", Some(error.clone()), Some(recovery_hint.clone())),
    };

    ShellStatus {
        state: state_str.into(),
        url,
        pid,
        started_by_us,
        error,
        recovery_hint,
    }
}

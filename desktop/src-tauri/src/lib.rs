#![allow(dead_code)]

mod commands;
mod logging;
mod presentation;
mod server;
mod status;

use logging::setup_logging;
use presentation::{DialogShutdownPrompt, WebviewStatusSurface};
use server::{ServerError, ServerSupervisor, ShellConfig, ShutdownOutcome};
use status::StatusChannel;

#[cfg(test)]
mod tests;

use std::sync::Arc;

use tauri::webview::PageLoadEvent;
use tauri::{AppHandle, Manager, RunEvent, WindowEvent};
use tracing::{error, info};

const TAURI_DATA_DIR: &str = ".tauri";

#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    tauri::Builder::default()
        .plugin(tauri_plugin_single_instance::init(|app, _argv, _cwd| {
            presentation::focus_main_window(app);
        }))
        .plugin(tauri_plugin_dialog::init())
        .setup(|app| {
            let app_data_dir = app.path().app_data_dir()?;

            let tauri_dir = app_data_dir.join(TAURI_DATA_DIR);
            std::fs::create_dir_all(&tauri_dir)
                .map_err(|e| ServerError::data_dir_creation(&tauri_dir, e))?;

            let config = ShellConfig::load_or_create(&tauri_dir)
                .map_err(|e| format!("Config error: {e}\n\nHint: {}", e.recovery_hint()))?;

            setup_logging(&tauri_dir, &config.logging)?;

            info!("Starting Vibe Kanban desktop v{}", env!("CARGO_PKG_VERSION"));
            info!("Tauri directory: {:?}", tauri_dir);

            let runtime = tauri::async_runtime::block_on(async {
                tokio::runtime::Handle::current()
            });

            let surface = Arc::new(WebviewStatusSurface::new(app.handle().clone()));
            let status = StatusChannel::new(surface.clone(), &config.status, runtime);
            let supervisor = Arc::new(ServerSupervisor::new(config, status));

            app.manage(surface.clone());
            app.manage(supervisor.clone());

            presentation::create_main_window(app.handle())?;

            #[cfg(unix)]
            spawn_signal_handler(app.handle().clone());

            commands::spawn_server_start(supervisor, surface);

            Ok(())
        })
        .on_page_load(|webview, payload| {
            if !matches!(payload.event(), PageLoadEvent::Finished) {
                return;
            }

            let app = webview.app_handle();
            let (Some(supervisor), Some(surface)) = (
                app.try_state::<Arc<ServerSupervisor>>(),
                app.try_state::<Arc<WebviewStatusSurface>>(),
            ) else {
                return;
            };

            let url = payload.url();
            if url.path().ends_with(presentation::LOADING_PAGE) {
                surface.set_showing_loading(true);
            } else if is_server_page(url, supervisor.config().server.port) {
                info!("Web UI loaded from {url}");
                surface.set_showing_loading(false);
                supervisor.status().teardown();
                supervisor.mark_connected();
            }
        })
        .on_window_event(|window, event| {
            let WindowEvent::CloseRequested { api, .. } = event else {
                return;
            };
            let app = window.app_handle();
            let Some(supervisor) = app.try_state::<Arc<ServerSupervisor>>() else {
                return;
            };
            if !presentation::should_hold_close(window.label(), supervisor.exit_allowed()) {
                return;
            }

            // Cancel keeps the window; Exit ends the app through `app.exit`.
            api.prevent_close();
            let supervisor = supervisor.inner().clone();
            let app = app.clone();
            tauri::async_runtime::spawn(async move {
                request_exit(app, supervisor, 0).await;
            });
        })
        .invoke_handler(tauri::generate_handler![
            commands::get_shell_status,
            commands::loading_view_ready,
            commands::retry_server_start,
        ])
        .build(tauri::generate_context!())
        .expect("error while building tauri application")
        .run(|app_handle, event| {
            if let RunEvent::ExitRequested { api, code, .. } = event {
                let Some(supervisor) = app_handle.try_state::<Arc<ServerSupervisor>>() else {
                    return;
                };
                if supervisor.exit_allowed() {
                    info!("Exit requested (code: {code:?})");
                    return;
                }

                api.prevent_exit();
                let supervisor = supervisor.inner().clone();
                let app_handle = app_handle.clone();
                tauri::async_runtime::spawn(async move {
                    request_exit(app_handle, supervisor, code.unwrap_or(0)).await;
                });
            }
        });
}

async fn request_exit(app: AppHandle, supervisor: Arc<ServerSupervisor>, code: i32) {
    let prompt = Arc::new(DialogShutdownPrompt::new(app.clone()));
    match supervisor.shutdown(prompt).await {
        ShutdownOutcome::Exit => {
            info!("Exiting (code: {code})");
            app.exit(code);
        }
        ShutdownOutcome::Stay => info!("Exit cancelled"),
        ShutdownOutcome::PromptInFlight => {}
    }
}

fn is_server_page(url: &tauri::Url, port: u16) -> bool {
    matches!(url.scheme(), "http" | "https") && url.port_or_known_default() == Some(port)
}

#[cfg(unix)]
fn spawn_signal_handler(app: AppHandle) {
    std::thread::spawn(move || {
        use signal_hook::consts::{SIGINT, SIGTERM};
        use signal_hook::iterator::Signals;

        let mut signals = match Signals::new([SIGINT, SIGTERM]) {
            Ok(s) => s,
            Err(e) => {
                error!("Failed to register signal handlers: {e}");
                return;
            }
        };

        if let Some(sig) = signals.forever().next() {
            info!("Received signal {sig}, shutting down...");

            if let Some(supervisor) = app.try_state::<Arc<ServerSupervisor>>() {
                tauri::async_runtime::block_on(async {
                    match supervisor.stop_owned().await {
                        Some(report) => info!("Server stopped due to signal {sig}: {report:?}"),
                        None => info!("No server of ours to stop"),
                    }
                });
            }

            app.exit(0);
        }
    });
}

//! Main window, loading view bridge and exit prompt.

use crate::server::{ShutdownChoice, ShutdownPrompt};
use crate::status::{StatusMessage, StatusSurface, SurfaceError};

use std::sync::atomic::{AtomicBool, Ordering};

use tauri::{AppHandle, Manager, WebviewUrl, WebviewWindow, WebviewWindowBuilder};
use tauri_plugin_dialog::{
    DialogExt, MessageDialogButtons, MessageDialogKind, MessageDialogResult,
};
use tracing::{debug, info};

pub const MAIN_WINDOW_LABEL: &str = "main";
pub const LOADING_PAGE: &str = "loading.html";

const WINDOW_TITLE: &str = "Vibe Kanban";
const WINDOW_WIDTH: f64 = 1400.0;
const WINDOW_HEIGHT: f64 = 900.0;

const STOP_LABEL: &str = "Stop server";
const LEAVE_LABEL: &str = "Leave running";
const CANCEL_LABEL: &str = "Cancel";

/// Rewrites relative WebSocket URLs (`/api/...`) against the page origin.
///
/// The web UI opens sockets with path-only URLs, which the webview rejects.
pub const WEBSOCKET_FIX_SCRIPT: &str = r#"
(function () {
  if (window.__vibeWebSocketFixed) return;
  window.__vibeWebSocketFixed = true;
  var Native = window.WebSocket;
  function Patched(url, protocols) {
    if (typeof url === 'string' && url.charAt(0) === '/') {
      var scheme = window.location.protocol === 'https:' ? 'wss://' : 'ws://';
      url = scheme + window.location.host + url;
    }
    return protocols === undefined ? new Native(url) : new Native(url, protocols);
  }
  Patched.prototype = Native.prototype;
  Patched.CONNECTING = Native.CONNECTING;
  Patched.OPEN = Native.OPEN;
  Patched.CLOSING = Native.CLOSING;
  Patched.CLOSED = Native.CLOSED;
  window.WebSocket = Patched;
})();
"#;

/// Build the main window showing the bundled loading view.
pub fn create_main_window(app: &AppHandle) -> tauri::Result<WebviewWindow> {
    WebviewWindowBuilder::new(app, MAIN_WINDOW_LABEL, WebviewUrl::App(LOADING_PAGE.into()))
        .title(WINDOW_TITLE)
        .inner_size(WINDOW_WIDTH, WINDOW_HEIGHT)
        .background_color(tauri::window::Color(0x1a, 0x1a, 0x1a, 0xff))
        .initialization_script(WEBSOCKET_FIX_SCRIPT)
        .build()
}

/// Bring the main window to the front, e.g. on a second launch.
pub fn focus_main_window(app: &AppHandle) {
    if let Some(window) = app.get_webview_window(MAIN_WINDOW_LABEL) {
        window.unminimize().ok();
        window.show().ok();
        window.set_focus().ok();
    }
}

/// Whether closing the window labelled `label` must wait for the exit prompt.
pub fn should_hold_close(label: &str, exit_allowed: bool) -> bool {
    label == MAIN_WINDOW_LABEL && !exit_allowed
}

/// JavaScript that replaces the current page with `url`.
pub fn navigation_script(url: &str) -> Result<String, SurfaceError> {
    Ok(format!("window.location.replace({});", serde_json::to_string(url)?))
}

/// JavaScript that hands `status` to the loading view.
pub fn update_script(status: &StatusMessage) -> Result<String, SurfaceError> {
    let payload = serde_json::to_string(status)?;
    Ok(format!(
        "window.__vibeLoading && window.__vibeLoading.update({payload});"
    ))
}

/// Status surface backed by the loading page in the main webview.
pub struct WebviewStatusSurface {
    app: AppHandle,
    showing_loading: AtomicBool,
}

impl WebviewStatusSurface {
    pub fn new(app: AppHandle) -> Self {
        Self {
            app,
            showing_loading: AtomicBool::new(true),
        }
    }

    pub fn set_showing_loading(&self, showing: bool) {
        self.showing_loading.store(showing, Ordering::Release);
    }

    /// Replace the loading view with the web UI at `url`.
    pub fn navigate(&self, url: &str) -> Result<(), SurfaceError> {
        let window = self.window()?;
        info!("Navigating main window to {url}");
        self.set_showing_loading(false);
        window
            .eval(&navigation_script(url)?)
            .map_err(|e| SurfaceError::Script(e.to_string()))
    }

    fn window(&self) -> Result<WebviewWindow, SurfaceError> {
        self.app
            .get_webview_window(MAIN_WINDOW_LABEL)
            .ok_or(SurfaceError::Unavailable)
    }
}

impl StatusSurface for WebviewStatusSurface {
    fn is_available(&self) -> bool {
        self.app.get_webview_window(MAIN_WINDOW_LABEL).is_some()
    }

    fn is_showing_loading(&self) -> bool {
        self.showing_loading.load(Ordering::Acquire)
    }

    fn push(&self, status: &StatusMessage) -> Result<(), SurfaceError> {
        let script = update_script(status)?;
        debug!("Loading view <- {}", status.title);
        self.window()?
            .eval(&script)
            .map_err(|e| SurfaceError::Script(e.to_string()))
    }
}

/// Native three-button exit prompt.
pub struct DialogShutdownPrompt {
    app: AppHandle,
}

impl DialogShutdownPrompt {
    pub fn new(app: AppHandle) -> Self {
        Self { app }
    }
}

impl ShutdownPrompt for DialogShutdownPrompt {
    fn choose(&self) -> ShutdownChoice {
        let result = self
            .app
            .dialog()
            .message(
                "The Vibe Kanban server started by this app is still running.\n\
                 Stop it before quitting?",
            )
            .title("Quit Vibe Kanban")
            .kind(MessageDialogKind::Warning)
            .buttons(MessageDialogButtons::YesNoCancelCustom(
                STOP_LABEL.into(),
                LEAVE_LABEL.into(),
                CANCEL_LABEL.into(),
            ))
            .blocking_show_with_result();

        choice_from_result(&result)
    }
}

/// Map a dialog answer to a shutdown choice. Anything unrecognised cancels.
pub fn choice_from_result(result: &MessageDialogResult) -> ShutdownChoice {
    match result {
        MessageDialogResult::Yes => ShutdownChoice::StopServer,
        MessageDialogResult::No => ShutdownChoice::LeaveRunning,
        MessageDialogResult::Custom(label) if label == STOP_LABEL => ShutdownChoice::StopServer,
        MessageDialogResult::Custom(label) if label == LEAVE_LABEL => ShutdownChoice::LeaveRunning,
        _ => ShutdownChoice::Cancel,
    }
}

//! Turns supervised process output into loading-view status.
//!
//! Classification is a best-effort heuristic over the text. It only matters
//! while a start attempt is in progress; once the server answers or the
//! attempt fails, output is logged and nothing more.

use crate::server::sanitize::{sanitize, summarize};
use crate::status::{Severity, StatusChannel, StatusMessage};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

pub const INSTALLING_TITLE: &str = "Installing dependencies…";
pub const PROGRESS_TITLE: &str = "Starting the server…";
pub const WARNING_TITLE: &str = "Starting, almost there…";

/// Lowercase fragments that indicate package download/installation.
const INSTALL_KEYWORDS: [&str; 7] = [
    "install",
    "download",
    "fetching",
    "resolving",
    "extracting",
    "added ",
    "packages in",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

impl OutputStream {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Stdout => "stdout",
            Self::Stderr => "stderr",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputCategory {
    Installing,
    Progress,
    Warning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub category: OutputCategory,
    pub severity: Severity,
}

/// Classify one chunk of (already sanitized) output.
///
/// Install activity wins on either stream; otherwise stderr is a warning and
/// stdout is plain progress.
pub fn classify(stream: OutputStream, text: &str) -> Classification {
    let lower = text.to_lowercase();
    if INSTALL_KEYWORDS.iter().any(|k| lower.contains(k)) {
        return Classification {
            category: OutputCategory::Installing,
            severity: Severity::Info,
        };
    }

    match stream {
        OutputStream::Stderr => Classification {
            category: OutputCategory::Warning,
            severity: Severity::Warn,
        },
        OutputStream::Stdout => Classification {
            category: OutputCategory::Progress,
            severity: Severity::Info,
        },
    }
}

/// Routes output chunks to status messages until the start attempt ends.
///
/// Shared by the stdout and stderr readers of one process.
#[derive(Debug, Default)]
pub struct OutputRouter {
    closed: AtomicBool,
    last_info: Mutex<Option<String>>,
    last_warn: Mutex<Option<String>>,
}

impl OutputRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop producing status; output is only logged from now on.
    ///
    /// Called once the start attempt ends, whether the server came up or not.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Status for a raw chunk, or `None` when it should not be shown.
    pub fn route(&self, stream: OutputStream, raw: &str) -> Option<StatusMessage> {
        if self.is_closed() {
            return None;
        }

        let cleaned = sanitize(raw);
        let summary = summarize(&cleaned)?;
        let classification = classify(stream, &cleaned);

        let (title, last_text) = match classification.category {
            OutputCategory::Installing => (INSTALLING_TITLE, &self.last_info),
            OutputCategory::Progress => (PROGRESS_TITLE, &self.last_info),
            OutputCategory::Warning => (WARNING_TITLE, &self.last_warn),
        };

        {
            let mut last = last_text.lock().unwrap_or_else(PoisonError::into_inner);
            if last.as_deref() == Some(summary.as_str()) {
                return None;
            }
            *last = Some(summary.clone());
        }

        Some(StatusMessage::new(classification.severity, title).with_detail(summary))
    }
}

/// Read `stream` line by line, log it, and forward routed status.
///
/// Bytes are decoded lossily so invalid UTF-8 cannot stop the reader.
pub fn spawn_output_reader(
    stream: impl AsyncRead + Unpin + Send + 'static,
    kind: OutputStream,
    router: Arc<OutputRouter>,
    status: StatusChannel,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut reader = BufReader::new(stream);
        let mut buf: Vec<u8> = Vec::with_capacity(1024);

        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {
                    let raw = String::from_utf8_lossy(&buf);
                    let cleaned = sanitize(&raw);
                    if cleaned.is_empty() {
                        continue;
                    }

                    match kind {
                        OutputStream::Stdout => debug!(target: "vibe_server", "{cleaned}"),
                        OutputStream::Stderr => warn!(target: "vibe_server", "{cleaned}"),
                    }

                    if let Some(message) = router.route(kind, &raw) {
                        status.send(message);
                    }
                }
                Err(e) => {
                    debug!("Server {} reader exiting after read error: {e}", kind.as_str());
                    break;
                }
            }
        }

        debug!("Server {} reader finished", kind.as_str());
    })
}

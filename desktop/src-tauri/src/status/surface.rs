use super::StatusMessage;

use thiserror::Error;

/// Failure pushing a status into the presentation layer.
#[derive(Error, Debug)]
pub enum SurfaceError {
    #[error("Presentation surface is not available")]
    Unavailable,

    #[error("Failed to serialize status payload: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Presentation surface rejected the update: {0}")]
    Script(String),
}

/// The view the status channel pushes into.
///
/// Implemented by the host window in the app and by recording fakes in tests.
pub trait StatusSurface: Send + Sync {
    /// Whether the surface exists at all (window created and not destroyed).
    fn is_available(&self) -> bool;

    /// Whether the surface currently shows the loading view rather than the
    /// final remote content.
    fn is_showing_loading(&self) -> bool;

    /// Render one status. Must be idempotent.
    fn push(&self, status: &StatusMessage) -> Result<(), SurfaceError>;
}

mod channel;
mod status_message;
mod surface;

pub use channel::{SendOutcome, StatusChannel};
pub use status_message::{Severity, StatusMessage};
pub use surface::{StatusSurface, SurfaceError};

mod config;
mod error;
mod flag_guard;
mod health;
mod lifecycle;
mod logging_settings;
mod output;
mod process_tree;
mod resilience_settings;
pub mod resolver;
pub mod sanitize;
mod server_handle;
mod server_settings;
mod server_state;
mod server_status;
mod shutdown;
mod status_settings;

pub use config::{CONFIG_VERSION, ShellConfig};
pub use error::{Result as ServerResult, ServerError};
pub use health::{HealthProbe, HttpHealthProber};
pub use lifecycle::{
    CHECKING_TITLE, CONNECTING_TITLE, FAILED_TITLE, READY_TITLE, STARTING_TITLE, ServerSupervisor,
    StartOutcome,
};
pub use logging_settings::LoggingSettings;
pub use output::{
    Classification, INSTALLING_TITLE, OutputCategory, OutputRouter, OutputStream, PROGRESS_TITLE,
    WARNING_TITLE, classify, spawn_output_reader,
};
pub use process_tree::{StopReport, isolate_process_group, stop_gracefully, terminate_tree};
pub use resilience_settings::ResilienceSettings;
pub use server_handle::{ExitInfo, Liveness, ServerHandle, wait_for_exit};
pub use server_settings::ServerSettings;
pub use server_state::SupervisorState;
pub use server_status::ShellStatus;
pub use shutdown::{ShutdownChoice, ShutdownGate, ShutdownOutcome, ShutdownPrompt};
pub use status_settings::StatusSettings;

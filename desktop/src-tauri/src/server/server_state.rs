/// Where the supervisor is in the server lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SupervisorState {
    /// Nothing checked or started yet
    Idle,
    /// Probing for an existing server
    Checking,
    /// An existing server answered; nothing was spawned
    AlreadyRunning,
    /// Resolving and launching the server
    Spawning,
    /// Launched, waiting for the first successful health check
    Starting,
    /// Our server answered its health check
    Ready,
    /// The web UI is shown
    Connected,
    /// The last start attempt failed
    Failed { error: String, recovery_hint: String },
    /// Terminating our server
    Stopping,
}

//! Exit-time decision about a server this instance started.

use crate::server::flag_guard::AtomicFlagGuard;

use std::sync::atomic::{AtomicBool, Ordering};

/// The user's answer to the exit prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownChoice {
    StopServer,
    LeaveRunning,
    Cancel,
}

/// Asks the user what to do with the server on exit.
///
/// `choose` blocks until answered; the supervisor runs it off the async
/// workers.
pub trait ShutdownPrompt: Send + Sync {
    fn choose(&self) -> ShutdownChoice;
}

/// Result of a shutdown attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// Teardown is done; the application may exit.
    Exit,
    /// The user cancelled; keep the application open.
    Stay,
    /// Another shutdown is already waiting on the user.
    PromptInFlight,
}

/// Re-entrancy guard and decision memory for the exit prompt.
#[derive(Debug, Default)]
pub struct ShutdownGate {
    prompt_in_flight: AtomicBool,
    decided: AtomicBool,
}

impl ShutdownGate {
    /// Claim the prompt; `None` while another prompt is open.
    pub fn try_begin_prompt(&self) -> Option<AtomicFlagGuard<'_>> {
        AtomicFlagGuard::try_set(&self.prompt_in_flight)
    }

    pub fn is_prompting(&self) -> bool {
        self.prompt_in_flight.load(Ordering::Acquire)
    }

    /// A final (non-cancel) decision was made; later exits go straight through.
    pub fn mark_decided(&self) {
        self.decided.store(true, Ordering::Release);
    }

    pub fn is_decided(&self) -> bool {
        self.decided.load(Ordering::Acquire)
    }
}

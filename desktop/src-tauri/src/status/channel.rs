//! Severity-aware, de-duplicating status bus in front of the loading view.
//!
//! Status text arrives from free-running process output and from health
//! polling. The channel makes sure that:
//! - an identical message is only rendered once in a row,
//! - a warning or error stays on screen for a minimum hold window before a
//!   lower-severity line may replace it,
//! - messages sent before the loading view is ready are buffered and replayed
//!   in order.

use super::{StatusMessage, StatusSurface};
use crate::server::StatusSettings;

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

/// What happened to a single `send`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// Channel torn down or surface gone; message dropped.
    Inactive,
    /// Identical to the last delivered message; dropped.
    Duplicate,
    /// Held back until the current severity hold expires.
    Queued,
    /// Surface not ready yet; buffered for later.
    Pending,
    /// Rendered.
    Delivered,
    /// Surface failed to render; dropped.
    Error,
}

impl SendOutcome {
    /// Whether draining the pending queue has to stop at this outcome.
    fn blocks_drain(self) -> bool {
        matches!(self, Self::Pending | Self::Queued | Self::Inactive)
    }

    /// Whether the message stays at the head of the pending queue.
    fn keeps_pending(self) -> bool {
        matches!(self, Self::Pending | Self::Inactive)
    }
}

#[derive(Debug)]
struct ChannelState {
    active: bool,
    presentation_ready: bool,
    last_delivered_key: Option<u64>,
    pending: VecDeque<StatusMessage>,
    current_severity: u8,
    hold_until: Option<Instant>,
    queued_after_hold: Option<StatusMessage>,
    release_timer: Option<JoinHandle<()>>,
}

impl ChannelState {
    fn new() -> Self {
        Self {
            active: true,
            presentation_ready: false,
            last_delivered_key: None,
            pending: VecDeque::new(),
            current_severity: 0,
            hold_until: None,
            queued_after_hold: None,
            release_timer: None,
        }
    }

    fn clear_hold(&mut self) {
        self.hold_until = None;
        self.current_severity = 0;
        if let Some(timer) = self.release_timer.take() {
            timer.abort();
        }
    }
}

struct Inner {
    surface: Arc<dyn StatusSurface>,
    runtime: Handle,
    warn_hold: Duration,
    error_hold: Duration,
    state: Mutex<ChannelState>,
}

/// Cloneable handle to the loading status channel.
#[derive(Clone)]
pub struct StatusChannel {
    inner: Arc<Inner>,
}

impl StatusChannel {
    /// Create an active, not-yet-ready channel.
    ///
    /// Hold release timers are spawned on `runtime`.
    pub fn new(surface: Arc<dyn StatusSurface>, settings: &StatusSettings, runtime: Handle) -> Self {
        Self {
            inner: Arc::new(Inner {
                surface,
                runtime,
                warn_hold: settings.warn_hold(),
                error_hold: settings.error_hold(),
                state: Mutex::new(ChannelState::new()),
            }),
        }
    }

    /// Send a status, honouring dedup and severity holds.
    pub fn send(&self, status: StatusMessage) -> SendOutcome {
        self.send_with(status, false)
    }

    /// Send a status bypassing dedup and severity holds.
    pub fn send_forced(&self, status: StatusMessage) -> SendOutcome {
        self.send_with(status, true)
    }

    fn send_with(&self, status: StatusMessage, force: bool) -> SendOutcome {
        let title = status.title.clone();
        let mut state = self.lock();
        let outcome = self.evaluate(&mut state, status, force, false);
        if outcome == SendOutcome::Delivered {
            self.drain_pending(&mut state);
        }
        debug!("Status '{title}' -> {outcome:?}");
        outcome
    }

    /// The loading view finished its first render and can take updates.
    pub fn mark_ready(&self) {
        let mut state = self.lock();
        if !state.presentation_ready {
            debug!("Loading view ready, {} pending status(es)", state.pending.len());
        }
        state.presentation_ready = true;
        self.drain_pending(&mut state);
    }

    /// A fresh loading view is being shown.
    ///
    /// Dedup, severity and hold state start over; pending messages are kept for
    /// the new view.
    pub fn reset(&self) {
        let mut state = self.lock();
        state.active = true;
        state.presentation_ready = false;
        state.last_delivered_key = None;
        state.queued_after_hold = None;
        state.clear_hold();
    }

    /// The final content replaced the loading view. Everything is dropped.
    pub fn teardown(&self) {
        let mut state = self.lock();
        state.active = false;
        state.presentation_ready = false;
        state.last_delivered_key = None;
        state.queued_after_hold = None;
        state.pending.clear();
        state.clear_hold();
        debug!("Status channel torn down");
    }

    pub fn is_active(&self) -> bool {
        self.lock().active
    }

    pub fn is_ready(&self) -> bool {
        self.lock().presentation_ready
    }

    pub fn pending_len(&self) -> usize {
        self.lock().pending.len()
    }

    /// Severity rank currently protected by a hold (0 when none).
    pub fn current_severity(&self) -> u8 {
        self.lock().current_severity
    }

    fn lock(&self) -> MutexGuard<'_, ChannelState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn evaluate(
        &self,
        state: &mut ChannelState,
        status: StatusMessage,
        force: bool,
        from_queue: bool,
    ) -> SendOutcome {
        if !state.active || !self.inner.surface.is_available() {
            return SendOutcome::Inactive;
        }

        let severity = status.severity.rank();
        let key = status.key();

        if !force && state.last_delivered_key == Some(key) {
            return SendOutcome::Duplicate;
        }

        let now = Instant::now();
        if let Some(until) = state.hold_until {
            if now >= until {
                state.hold_until = None;
                state.current_severity = 0;
            } else if !force && severity < state.current_severity {
                state.queued_after_hold = Some(status);
                self.schedule_release(state, until);
                return SendOutcome::Queued;
            }
        }

        if !state.presentation_ready || !self.inner.surface.is_showing_loading() {
            if !from_queue {
                state.pending.push_back(status);
            }
            return SendOutcome::Pending;
        }

        if let Err(e) = self.inner.surface.push(&status) {
            warn!("Failed to deliver status '{}': {e}", status.title);
            return SendOutcome::Error;
        }

        state.last_delivered_key = Some(key);
        state.current_severity = severity;

        let hold = match status.severity {
            super::Severity::Error => Some(self.inner.error_hold),
            super::Severity::Warn => Some(self.inner.warn_hold),
            super::Severity::Info => None,
        };
        if let Some(hold) = hold {
            let until = now + hold;
            let until = state.hold_until.map_or(until, |current| current.max(until));
            state.hold_until = Some(until);
            if state.queued_after_hold.is_some() {
                self.schedule_release(state, until);
            }
        }

        SendOutcome::Delivered
    }

    /// Replay pending messages in FIFO order until one cannot go out yet.
    fn drain_pending(&self, state: &mut ChannelState) {
        while let Some(next) = state.pending.pop_front() {
            let outcome = self.evaluate(state, next.clone(), false, true);
            if outcome.blocks_drain() {
                if outcome.keeps_pending() {
                    state.pending.push_front(next);
                }
                break;
            }
        }
    }

    /// (Re)arm the timer that releases `queued_after_hold` at `until`.
    fn schedule_release(&self, state: &mut ChannelState, until: Instant) {
        if let Some(timer) = state.release_timer.take() {
            timer.abort();
        }

        let weak = Arc::downgrade(&self.inner);
        state.release_timer = Some(self.inner.runtime.spawn(async move {
            tokio::time::sleep_until(until).await;
            if let Some(inner) = weak.upgrade() {
                StatusChannel { inner }.release_held();
            }
        }));
    }

    fn release_held(&self) {
        let mut state = self.lock();
        state.release_timer = None;

        if let Some(until) = state.hold_until {
            if Instant::now() < until {
                // Hold was extended after this timer was armed.
                self.schedule_release(&mut state, until);
                return;
            }
            state.hold_until = None;
            state.current_severity = 0;
        }

        if let Some(held) = state.queued_after_hold.take() {
            let title = held.title.clone();
            let outcome = self.evaluate(&mut state, held, false, false);
            debug!("Released held status '{title}' -> {outcome:?}");
            if outcome == SendOutcome::Delivered {
                self.drain_pending(&mut state);
            }
        }
    }
}

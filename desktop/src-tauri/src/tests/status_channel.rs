//! Loading status channel: dedup, severity holds, pending queue.

use crate::server::StatusSettings;
use crate::status::{SendOutcome, Severity, StatusChannel, StatusMessage};
use crate::tests::RecordingSurface;

use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;

fn channel() -> (StatusChannel, Arc<RecordingSurface>) {
    let surface = Arc::new(RecordingSurface::new());
    let channel = StatusChannel::new(
        surface.clone(),
        &StatusSettings::default(),
        Handle::current(),
    );
    (channel, surface)
}

fn ready_channel() -> (StatusChannel, Arc<RecordingSurface>) {
    let (channel, surface) = channel();
    channel.mark_ready();
    (channel, surface)
}

// =============================================================================
// Dedup
// =============================================================================

#[tokio::test(start_paused = true)]
async fn given_same_message_twice_when_sent_then_delivered_once() {
    // Given
    let (channel, surface) = ready_channel();
    let message = StatusMessage::info("Starting").with_detail("npx vibe-kanban");

    // When
    let first = channel.send(message.clone());
    let second = channel.send(message);

    // Then
    assert_eq!(first, SendOutcome::Delivered);
    assert_eq!(second, SendOutcome::Duplicate);
    assert_eq!(surface.delivered().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn given_same_message_twice_when_forced_then_delivered_twice() {
    let (channel, surface) = ready_channel();
    let message = StatusMessage::info("Starting");

    channel.send(message.clone());
    let forced = channel.send_forced(message);

    assert_eq!(forced, SendOutcome::Delivered);
    assert_eq!(surface.delivered().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn given_messages_differing_in_detail_when_sent_then_both_delivered() {
    let (channel, surface) = ready_channel();

    channel.send(StatusMessage::info("Starting").with_detail("a"));
    channel.send(StatusMessage::info("Starting").with_detail("b"));

    assert_eq!(surface.delivered().len(), 2);
}

// =============================================================================
// Severity holds
// =============================================================================

#[tokio::test(start_paused = true)]
async fn given_warn_delivered_when_info_sent_within_hold_then_queued_until_hold_expires() {
    // Given
    let (channel, surface) = ready_channel();
    channel.send(StatusMessage::warn("Slow start"));
    tokio::time::sleep(Duration::from_secs(1)).await;

    // When
    let outcome = channel.send(StatusMessage::info("Still working"));

    // Then
    assert_eq!(outcome, SendOutcome::Queued);
    assert_eq!(surface.titles(), vec!["Slow start".to_string()]);

    tokio::time::sleep(Duration::from_millis(2900)).await;
    assert_eq!(surface.titles().len(), 1);

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(
        surface.titles(),
        vec!["Slow start".to_string(), "Still working".to_string()]
    );
    assert_eq!(channel.current_severity(), Severity::Info.rank());
}

#[tokio::test(start_paused = true)]
async fn given_warn_delivered_when_error_sent_within_hold_then_delivered_immediately() {
    let (channel, surface) = ready_channel();
    channel.send(StatusMessage::warn("Slow start"));
    tokio::time::sleep(Duration::from_secs(1)).await;

    let outcome = channel.send(StatusMessage::error("Server crashed"));

    assert_eq!(outcome, SendOutcome::Delivered);
    assert_eq!(surface.titles().last().map(String::as_str), Some("Server crashed"));
    assert_eq!(channel.current_severity(), Severity::Error.rank());
}

#[tokio::test(start_paused = true)]
async fn given_error_delivered_when_info_queued_then_released_after_error_hold() {
    let (channel, surface) = ready_channel();
    channel.send(StatusMessage::error("Failed"));

    channel.send(StatusMessage::info("Retrying"));
    tokio::time::sleep(Duration::from_millis(7900)).await;
    assert_eq!(surface.titles(), vec!["Failed".to_string()]);

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(
        surface.titles(),
        vec!["Failed".to_string(), "Retrying".to_string()]
    );
}

#[tokio::test(start_paused = true)]
async fn given_two_infos_queued_during_hold_then_only_latest_is_released() {
    let (channel, surface) = ready_channel();
    channel.send(StatusMessage::warn("Warning"));

    channel.send(StatusMessage::info("first"));
    channel.send(StatusMessage::info("second"));
    tokio::time::sleep(Duration::from_secs(5)).await;

    assert_eq!(
        surface.titles(),
        vec!["Warning".to_string(), "second".to_string()]
    );
}

#[tokio::test(start_paused = true)]
async fn given_warn_hold_when_forced_info_sent_then_delivered_despite_hold() {
    let (channel, surface) = ready_channel();
    channel.send(StatusMessage::warn("Warning"));

    let outcome = channel.send_forced(StatusMessage::info("Ready"));

    assert_eq!(outcome, SendOutcome::Delivered);
    assert_eq!(surface.delivered().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn given_hold_expired_when_info_sent_then_delivered_and_severity_reset() {
    let (channel, surface) = ready_channel();
    channel.send(StatusMessage::warn("Warning"));
    tokio::time::sleep(Duration::from_secs(5)).await;

    let outcome = channel.send(StatusMessage::info("Ready"));

    assert_eq!(outcome, SendOutcome::Delivered);
    assert_eq!(surface.delivered().len(), 2);
    assert_eq!(channel.current_severity(), Severity::Info.rank());
}

// =============================================================================
// Pending queue
// =============================================================================

#[tokio::test(start_paused = true)]
async fn given_view_not_ready_when_messages_sent_then_drained_in_order_once_ready() {
    // Given
    let (channel, surface) = channel();
    let titles = ["checking", "starting", "installing", "ready"];

    // When
    let outcomes: Vec<SendOutcome> = titles
        .iter()
        .map(|t| channel.send(StatusMessage::info(*t)))
        .collect();

    // Then
    assert!(outcomes.iter().all(|o| *o == SendOutcome::Pending));
    assert_eq!(channel.pending_len(), 4);
    assert!(surface.delivered().is_empty());

    channel.mark_ready();

    assert_eq!(surface.titles(), titles.map(String::from).to_vec());
    assert_eq!(channel.pending_len(), 0);
}

#[tokio::test(start_paused = true)]
async fn given_pending_warn_then_info_when_ready_then_info_waits_for_hold() {
    let (channel, surface) = channel();
    channel.send(StatusMessage::warn("stderr noise"));
    channel.send(StatusMessage::info("progress"));

    channel.mark_ready();

    assert_eq!(surface.titles(), vec!["stderr noise".to_string()]);

    tokio::time::sleep(Duration::from_millis(4100)).await;
    assert_eq!(
        surface.titles(),
        vec!["stderr noise".to_string(), "progress".to_string()]
    );
}

#[tokio::test(start_paused = true)]
async fn given_surface_gone_while_draining_when_ready_then_pending_messages_kept() {
    // Given
    let (channel, surface) = channel();
    channel.send(StatusMessage::info("checking"));
    channel.send(StatusMessage::info("starting"));
    surface.set_available(false);

    // When
    channel.mark_ready();

    // Then
    assert!(surface.delivered().is_empty());
    assert_eq!(channel.pending_len(), 2);

    surface.set_available(true);
    channel.mark_ready();

    assert_eq!(
        surface.titles(),
        vec!["checking".to_string(), "starting".to_string()]
    );
    assert_eq!(channel.pending_len(), 0);
}

#[tokio::test(start_paused = true)]
async fn given_remote_content_shown_when_sent_then_pending() {
    let (channel, surface) = ready_channel();
    surface.set_showing_loading(false);

    let outcome = channel.send(StatusMessage::info("late"));

    assert_eq!(outcome, SendOutcome::Pending);
    assert!(surface.delivered().is_empty());
}

// =============================================================================
// Lifecycle
// =============================================================================

#[tokio::test(start_paused = true)]
async fn given_torn_down_channel_when_sent_then_inactive() {
    let (channel, surface) = ready_channel();
    channel.send(StatusMessage::info("pending"));

    channel.teardown();
    let outcome = channel.send(StatusMessage::info("after"));

    assert_eq!(outcome, SendOutcome::Inactive);
    assert!(!channel.is_active());
    assert_eq!(surface.delivered().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn given_surface_unavailable_when_sent_then_inactive() {
    let (channel, surface) = ready_channel();
    surface.set_available(false);

    assert_eq!(
        channel.send(StatusMessage::info("x")),
        SendOutcome::Inactive
    );
}

#[tokio::test(start_paused = true)]
async fn given_surface_failing_when_sent_then_error_and_channel_stays_active() {
    let (channel, surface) = ready_channel();
    surface.set_failing(true);

    let outcome = channel.send(StatusMessage::info("x"));

    assert_eq!(outcome, SendOutcome::Error);
    assert!(channel.is_active());

    surface.set_failing(false);
    assert_eq!(channel.send(StatusMessage::info("x")), SendOutcome::Delivered);
}

#[tokio::test(start_paused = true)]
async fn given_reset_when_same_message_sent_again_then_redelivered() {
    let (channel, surface) = ready_channel();
    channel.send(StatusMessage::error("Failed"));

    channel.reset();
    assert!(!channel.is_ready());
    assert_eq!(channel.current_severity(), 0);

    channel.mark_ready();
    let outcome = channel.send(StatusMessage::error("Failed"));

    assert_eq!(outcome, SendOutcome::Delivered);
    assert_eq!(surface.delivered().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn given_reset_with_pending_messages_then_they_survive_for_new_view() {
    let (channel, surface) = channel();
    channel.send(StatusMessage::info("queued"));

    channel.reset();
    channel.mark_ready();

    assert_eq!(surface.titles(), vec!["queued".to_string()]);
}

//! Close guard and service lifecycle tests.

use super::fixtures::*;
use crate::config::ChatConfig;
use crate::error::ChatError;
use crate::send::SendOutcome;
use crate::services::{AlertSink, ChatServices};
use chat_types::RoomId;
use realtime_bridge::{RealtimeClient, RealtimeConfig};
use session_store::{SessionError, SessionStore};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use supabase_backend::{ChatBackend, SupabaseClient};

#[tokio::test]
async fn close_leaves_channel_once() {
    let backend = seeded_backend();
    let realtime = Arc::new(FakeRealtime::new());
    let alerts = Arc::new(RecordingAlerts::new());

    let session = open_room(&backend, &realtime, &alerts, ChatConfig::default(), ALICE)
        .await
        .unwrap();

    session.close().await;
    session.close().await;

    assert!(session.is_closed());
    assert_eq!(realtime.left_rooms().len(), 1);
}

#[tokio::test]
async fn send_after_close_is_rejected() {
    let backend = seeded_backend();
    let realtime = Arc::new(FakeRealtime::new());
    let alerts = Arc::new(RecordingAlerts::new());

    let session = open_room(&backend, &realtime, &alerts, ChatConfig::default(), ALICE)
        .await
        .unwrap();
    session.close().await;

    let err = session.send("too late").await.unwrap_err();

    assert!(matches!(err, ChatError::RoomClosed));
    assert_eq!(backend.insert_count(), 0);
    assert_eq!(session.message_count(), 0);
    assert_eq!(alerts.count(), 0);
}

#[tokio::test]
async fn realtime_insert_after_close_is_not_applied() {
    let backend = seeded_backend();
    backend.seed_messages(vec![server_msg(1, BOB, 10)]);
    let realtime = Arc::new(FakeRealtime::new());
    let alerts = Arc::new(RecordingAlerts::new());

    let session = open_room(&backend, &realtime, &alerts, ChatConfig::default(), ALICE)
        .await
        .unwrap();
    session.close().await;

    realtime.emit_insert(ROOM, server_msg(2, BOB, 20));
    settle().await;

    assert_eq!(session.message_count(), 1);
}

/// A send already in flight when the view closes still completes against
/// the backend: the row is committed and the room touch is issued. Only the
/// local bookkeeping is skipped.
#[tokio::test]
async fn pending_send_confirmed_after_close_still_touches_room() {
    let backend = seeded_backend();
    backend.hold_inserts.store(true, Ordering::SeqCst);
    let realtime = Arc::new(FakeRealtime::new());
    let alerts = Arc::new(RecordingAlerts::new());

    let session = Arc::new(
        open_room(&backend, &realtime, &alerts, ChatConfig::default(), ALICE)
            .await
            .unwrap(),
    );

    let bg = {
        let session = Arc::clone(&session);
        tokio::spawn(async move { session.send("in flight").await })
    };
    settle().await;
    assert_eq!(session.message_count(), 1);

    session.close().await;
    backend.hold_inserts.store(false, Ordering::SeqCst);
    backend.release_inserts();

    let result = bg.await.unwrap();
    assert!(matches!(result, Ok(SendOutcome::Sent(_))));
    assert_eq!(backend.touch_count(), 1);
    assert_eq!(alerts.count(), 0);
}

/// A send failing after the view closed raises no alert and leaves the log
/// alone; the error still reaches the caller.
#[tokio::test]
async fn pending_send_failed_after_close_stays_silent() {
    let backend = seeded_backend();
    backend.hold_inserts.store(true, Ordering::SeqCst);
    backend.fail_inserts.store(true, Ordering::SeqCst);
    let realtime = Arc::new(FakeRealtime::new());
    let alerts = Arc::new(RecordingAlerts::new());

    let session = Arc::new(
        open_room(&backend, &realtime, &alerts, ChatConfig::default(), ALICE)
            .await
            .unwrap(),
    );

    let bg = {
        let session = Arc::clone(&session);
        tokio::spawn(async move { session.send("doomed").await })
    };
    settle().await;
    assert_eq!(session.message_count(), 1);

    session.close().await;
    backend.release_inserts();

    let result = bg.await.unwrap();
    assert!(result.is_err());
    assert_eq!(alerts.count(), 0);
    assert_eq!(session.message_count(), 1);
}

fn test_services() -> ChatServices {
    let session = Arc::new(SessionStore::new("http://localhost:54321", "anon-key"));
    let backend = Arc::new(SupabaseClient::new("http://localhost:54321", "anon-key"))
        as Arc<dyn ChatBackend>;
    // Unroutable address so nothing leaves the process
    let realtime = Arc::new(RealtimeClient::new(RealtimeConfig {
        url: "ws://127.0.0.1:1".to_string(),
        ..RealtimeConfig::default()
    }));
    let alerts = Arc::new(RecordingAlerts::new()) as Arc<dyn AlertSink>;
    ChatServices::new(session, backend, realtime, alerts, ChatConfig::default())
}

#[tokio::test]
async fn services_initialize_and_teardown_are_idempotent() {
    let services = test_services();
    assert!(!services.is_initialized());

    services.initialize("anon-key");
    assert!(services.is_initialized());
    services.initialize("anon-key");
    assert!(services.is_initialized());

    services.teardown().await;
    assert!(!services.is_initialized());
    services.teardown().await;
    assert!(!services.is_initialized());
}

#[tokio::test]
async fn open_room_requires_a_signed_in_viewer() {
    let services = test_services();

    let err = services
        .open_room(RoomId::from_string(ROOM))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ChatError::Session(SessionError::NotSignedIn)
    ));
}

//! Realtime merge-by-identifier and echo suppression tests.

use super::fixtures::*;
use crate::config::{ChatConfig, EchoPolicy};
use crate::send::SendOutcome;
use chat_types::Message;
use std::sync::Arc;
use std::time::Duration;

fn sent_row(outcome: SendOutcome) -> Message {
    match outcome {
        SendOutcome::Sent(stored) => stored,
        SendOutcome::Skipped => panic!("non-empty send must not be skipped"),
    }
}

#[tokio::test]
async fn incoming_insert_appends_in_order() {
    let backend = seeded_backend();
    backend.seed_messages(vec![server_msg(1, BOB, 10)]);
    let realtime = Arc::new(FakeRealtime::new());
    let alerts = Arc::new(RecordingAlerts::new());

    let session = open_room(&backend, &realtime, &alerts, ChatConfig::default(), ALICE)
        .await
        .unwrap();
    let mut changes = session.subscribe_changes();
    let seen = *changes.borrow();

    realtime.emit_insert(ROOM, server_msg(2, BOB, 20));
    wait_for_revision(&mut changes, seen + 1).await;

    let ids: Vec<i64> = session.messages().iter().map(|m| m.id.as_i64()).collect();
    assert_eq!(ids, vec![1, 2]);
}

/// The same server row delivered twice lands once.
#[tokio::test]
async fn duplicate_insert_is_dropped() {
    let backend = seeded_backend();
    backend.seed_messages(vec![server_msg(1, BOB, 10)]);
    let realtime = Arc::new(FakeRealtime::new());
    let alerts = Arc::new(RecordingAlerts::new());

    let session = open_room(&backend, &realtime, &alerts, ChatConfig::default(), ALICE)
        .await
        .unwrap();
    let mut changes = session.subscribe_changes();
    let seen = *changes.borrow();

    realtime.emit_insert(ROOM, server_msg(2, BOB, 20));
    wait_for_revision(&mut changes, seen + 1).await;

    realtime.emit_insert(ROOM, server_msg(2, BOB, 20));
    settle().await;

    assert_eq!(session.message_count(), 2);
}

/// A row already present in the loaded history is also a duplicate.
#[tokio::test]
async fn insert_matching_history_row_is_dropped() {
    let backend = seeded_backend();
    backend.seed_messages(vec![server_msg(1, BOB, 10)]);
    let realtime = Arc::new(FakeRealtime::new());
    let alerts = Arc::new(RecordingAlerts::new());

    let session = open_room(&backend, &realtime, &alerts, ChatConfig::default(), ALICE)
        .await
        .unwrap();

    realtime.emit_insert(ROOM, server_msg(1, BOB, 10));
    settle().await;

    assert_eq!(session.message_count(), 1);
}

/// The echo of the viewer's own confirmed send is suppressed inside the
/// window; the optimistic entry stays the only copy.
#[tokio::test]
async fn own_echo_suppressed_within_window() {
    let backend = seeded_backend();
    let realtime = Arc::new(FakeRealtime::new());
    let alerts = Arc::new(RecordingAlerts::new());

    let session = open_room(&backend, &realtime, &alerts, ChatConfig::default(), ALICE)
        .await
        .unwrap();

    let stored = sent_row(session.send("hello").await.unwrap());
    realtime.emit_insert(ROOM, stored.clone());
    settle().await;

    let messages = session.messages();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].id.is_placeholder());
}

/// With a zero-length window the confirmation has already expired when the
/// echo arrives, so it appends like any other insert.
#[tokio::test]
async fn echo_appends_after_window_expired() {
    let backend = seeded_backend();
    let realtime = Arc::new(FakeRealtime::new());
    let alerts = Arc::new(RecordingAlerts::new());

    let config = ChatConfig {
        echo_policy: EchoPolicy::SuppressOwnWindow(Duration::ZERO),
        ..ChatConfig::default()
    };
    let session = open_room(&backend, &realtime, &alerts, config, ALICE)
        .await
        .unwrap();
    let mut changes = session.subscribe_changes();

    let stored = sent_row(session.send("hello").await.unwrap());
    let seen = *changes.borrow();
    realtime.emit_insert(ROOM, stored.clone());
    wait_for_revision(&mut changes, seen + 1).await;

    // Placeholder and echo now coexist; the optimistic entry is untouched
    let messages = session.messages();
    assert_eq!(messages.len(), 2);
    assert_eq!(
        messages.iter().filter(|m| m.id.is_placeholder()).count(),
        1
    );
    assert_eq!(
        messages.iter().filter(|m| m.id == stored.id).count(),
        1
    );
}

/// `AppendAll` never suppresses; the echo shows alongside the placeholder.
#[tokio::test]
async fn append_all_policy_keeps_echo() {
    let backend = seeded_backend();
    let realtime = Arc::new(FakeRealtime::new());
    let alerts = Arc::new(RecordingAlerts::new());

    let config = ChatConfig {
        echo_policy: EchoPolicy::AppendAll,
        ..ChatConfig::default()
    };
    let session = open_room(&backend, &realtime, &alerts, config, ALICE)
        .await
        .unwrap();
    let mut changes = session.subscribe_changes();

    let stored = sent_row(session.send("hello").await.unwrap());
    let seen = *changes.borrow();
    realtime.emit_insert(ROOM, stored.clone());
    wait_for_revision(&mut changes, seen + 1).await;

    let messages = session.messages();
    assert_eq!(messages.len(), 2);
    let placeholder = messages.iter().find(|m| m.id.is_placeholder()).unwrap();
    assert_eq!(placeholder.content, "hello");
}

/// The suppression window only covers the viewer's own confirmed ids; a
/// counterpart row arriving in the same window appends normally.
#[tokio::test]
async fn counterpart_insert_not_suppressed_by_window() {
    let backend = seeded_backend();
    let realtime = Arc::new(FakeRealtime::new());
    let alerts = Arc::new(RecordingAlerts::new());

    let session = open_room(&backend, &realtime, &alerts, ChatConfig::default(), ALICE)
        .await
        .unwrap();
    let mut changes = session.subscribe_changes();

    session.send("hello").await.unwrap();
    let seen = *changes.borrow();
    realtime.emit_insert(ROOM, server_msg(99, BOB, 500));
    wait_for_revision(&mut changes, seen + 1).await;

    assert_eq!(session.message_count(), 2);
}

/// An insert with an older timestamp lands at its chronological position,
/// not at the tail.
#[tokio::test]
async fn out_of_order_insert_lands_by_timestamp() {
    let backend = seeded_backend();
    backend.seed_messages(vec![server_msg(1, BOB, 10), server_msg(3, ALICE, 30)]);
    let realtime = Arc::new(FakeRealtime::new());
    let alerts = Arc::new(RecordingAlerts::new());

    let session = open_room(&backend, &realtime, &alerts, ChatConfig::default(), ALICE)
        .await
        .unwrap();
    let mut changes = session.subscribe_changes();
    let seen = *changes.borrow();

    realtime.emit_insert(ROOM, server_msg(2, BOB, 20));
    wait_for_revision(&mut changes, seen + 1).await;

    let ids: Vec<i64> = session.messages().iter().map(|m| m.id.as_i64()).collect();
    assert_eq!(ids, vec![1, 2, 3]);
}

/// Events for other rooms never reach this view's log.
#[tokio::test]
async fn insert_for_other_room_is_ignored() {
    let backend = seeded_backend();
    backend.seed_messages(vec![server_msg(1, BOB, 10)]);
    let realtime = Arc::new(FakeRealtime::new());
    let alerts = Arc::new(RecordingAlerts::new());

    let session = open_room(&backend, &realtime, &alerts, ChatConfig::default(), ALICE)
        .await
        .unwrap();

    let mut foreign = server_msg(7, BOB, 70);
    foreign.room_id = chat_types::RoomId::from_string("room-2");
    realtime.emit_insert("room-2", foreign);
    settle().await;

    assert_eq!(session.message_count(), 1);
}

//! Integration tests for the room conversation engine.
//!
//! Test organization:
//!
//! - `rooms.rs`     - Room resolution and counterpart display
//! - `ordering.rs`  - History load, pagination and display order
//! - `sending.rs`   - Optimistic send lifecycle and failure handling
//! - `merging.rs`   - Realtime merge-by-identifier and echo suppression
//! - `lifecycle.rs` - Close guard and service lifecycle
//!
//! All tests run against the recording fakes in `fixtures.rs`; nothing here
//! opens a socket.

mod fixtures;
mod lifecycle;
mod merging;

use crate::config::ChatConfig;
use crate::send::SendOutcome;
use fixtures::*;
use std::sync::Arc;

/// Basic workflow: open a seeded room, send as one side, receive from the
/// other, close.
#[tokio::test]
async fn basic_workflow() {
    let backend = seeded_backend();
    backend.seed_messages(vec![server_msg(1, BOB, 10)]);
    let realtime = Arc::new(FakeRealtime::new());
    let alerts = Arc::new(RecordingAlerts::new());

    let session = open_room(&backend, &realtime, &alerts, ChatConfig::default(), ALICE)
        .await
        .unwrap();
    assert_eq!(session.message_count(), 1);
    assert_eq!(session.counterpart().name().as_deref(), Some("Bob Breaker"));

    // Send as the viewer
    let outcome = session.send("hello bob").await.unwrap();
    let stored = match outcome {
        SendOutcome::Sent(stored) => stored,
        SendOutcome::Skipped => panic!("non-empty send must not be skipped"),
    };
    assert!(stored.id.as_i64() > 0);
    assert_eq!(session.message_count(), 2);

    // Receive from the counterpart
    let mut changes = session.subscribe_changes();
    let seen = *changes.borrow();
    realtime.emit_insert(ROOM, server_msg(50, BOB, 100));
    wait_for_revision(&mut changes, seen + 1).await;
    assert_eq!(session.message_count(), 3);

    session.close().await;
    assert!(session.is_closed());
    assert_eq!(alerts.count(), 0);
}

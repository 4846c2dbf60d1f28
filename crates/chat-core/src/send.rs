//! Optimistic send pipeline.
//!
//! One send moves through Drafted, Optimistic, Persisting and ends Confirmed
//! or Failed. The optimistic entry keeps its negative placeholder id for its
//! whole lifetime; a confirmed send never rewrites it, a failed send removes
//! it and raises a single user-facing alert. There is no automatic retry.

use crate::error::{ChatError, ChatResult};
use crate::log::MessageLog;
use crate::services::AlertSink;
use chat_types::{Message, MessageId, NewMessage, RoomId, UserId};
use chrono::Utc;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use supabase_backend::ChatBackend;

/// Process-wide placeholder id allocator. Counts down from -1 so placeholder
/// ids never collide with server-assigned positive ids or with each other.
static PLACEHOLDER_SEQ: AtomicI64 = AtomicI64::new(-1);

/// Allocate the next placeholder id.
pub fn next_placeholder_id() -> MessageId {
    MessageId(PLACEHOLDER_SEQ.fetch_sub(1, Ordering::Relaxed))
}

/// Lifecycle of a single send, used in structured log fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendState {
    Drafted,
    Optimistic,
    Persisting,
    Confirmed,
    Failed,
}

/// What a send call produced.
#[derive(Debug)]
pub enum SendOutcome {
    /// Input was empty after trimming; nothing happened.
    Skipped,
    /// The stored row as the backend committed it.
    Sent(Message),
}

/// Drives one room's sends against the backend and the shared log.
pub struct SendPipeline {
    backend: Arc<dyn ChatBackend>,
    alerts: Arc<dyn AlertSink>,
    log: Arc<Mutex<MessageLog>>,
    room_id: RoomId,
    viewer: UserId,
    closed: Arc<AtomicBool>,
}

impl SendPipeline {
    pub fn new(
        backend: Arc<dyn ChatBackend>,
        alerts: Arc<dyn AlertSink>,
        log: Arc<Mutex<MessageLog>>,
        room_id: RoomId,
        viewer: UserId,
        closed: Arc<AtomicBool>,
    ) -> Self {
        Self {
            backend,
            alerts,
            log,
            room_id,
            viewer,
            closed,
        }
    }

    /// Send one message.
    ///
    /// Empty or whitespace-only input is a no-op: no log mutation, no
    /// backend call. After the room view closed the call is rejected before
    /// touching anything.
    pub async fn send(&self, text: &str, access_token: &str) -> ChatResult<SendOutcome> {
        let content = text.trim();
        if content.is_empty() {
            tracing::debug!(state = ?SendState::Drafted, "Skipping empty send");
            return Ok(SendOutcome::Skipped);
        }
        if self.closed.load(Ordering::SeqCst) {
            return Err(ChatError::RoomClosed);
        }

        let placeholder_id = next_placeholder_id();
        let placeholder = Message {
            id: placeholder_id,
            room_id: self.room_id.clone(),
            sender_id: self.viewer.clone(),
            content: content.to_string(),
            created_at: Utc::now(),
        };
        {
            let mut log = self.log.lock().expect("lock poisoned");
            log.append_optimistic(placeholder);
        }
        tracing::debug!(
            state = ?SendState::Optimistic,
            placeholder_id = placeholder_id.as_i64(),
            "Appended optimistic entry"
        );

        let new_message = NewMessage::new(
            self.room_id.clone(),
            self.viewer.clone(),
            content.to_string(),
        );
        tracing::debug!(state = ?SendState::Persisting, room_id = %self.room_id, "Persisting message");

        match self.backend.insert_message(&new_message, access_token).await {
            Ok(stored) => {
                // 1. The stored row is the committed fact; the caller gets it back.
                // 2. Update log bookkeeping unless the room closed meanwhile.
                //    The optimistic entry stays as-is and its id never converges
                //    to the server id.
                // 3. Issue the single last-activity touch for this send.
                if !self.closed.load(Ordering::SeqCst) {
                    let mut log = self.log.lock().expect("lock poisoned");
                    log.record_confirmation(stored.id);
                }
                if let Err(e) = self
                    .backend
                    .touch_room(&self.room_id, stored.created_at, access_token)
                    .await
                {
                    tracing::warn!(room_id = %self.room_id, error = %e, "Last-activity touch failed");
                }
                tracing::info!(
                    state = ?SendState::Confirmed,
                    placeholder_id = placeholder_id.as_i64(),
                    server_id = stored.id.as_i64(),
                    "Message confirmed"
                );
                Ok(SendOutcome::Sent(stored))
            }
            Err(e) => {
                if !self.closed.load(Ordering::SeqCst) {
                    {
                        let mut log = self.log.lock().expect("lock poisoned");
                        log.remove_placeholder(placeholder_id);
                    }
                    self.alerts
                        .alert(&format!("Failed to send message: {}", e));
                }
                tracing::warn!(
                    state = ?SendState::Failed,
                    placeholder_id = placeholder_id.as_i64(),
                    error = %e,
                    "Message send failed"
                );
                Err(e.into())
            }
        }
    }
}

//! One open room view: resolved counterpart, loaded history, live updates
//! and the send pipeline, with a close guard shared by all of them.

use crate::config::ChatConfig;
use crate::error::ChatResult;
use crate::log::MessageLog;
use crate::room::{CounterpartDisplay, ResolvedRoom, RoomResolver};
use crate::send::{SendOutcome, SendPipeline};
use crate::services::{AlertSink, RealtimeFeed, TokenProvider};
use chat_types::{Message, Room, RoomId, UserId};
use realtime_bridge::RealtimeEvent;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use supabase_backend::{ChatBackend, MessagePage};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

/// A room opened for viewing and sending.
///
/// Opening resolves the counterpart, loads the full history and joins the
/// room's realtime channel. The view owns its in-memory log; the send
/// pipeline and the realtime apply task are its only writers. `close` leaves
/// the channel and arms a guard so in-flight work can no longer mutate the
/// log or raise alerts.
pub struct RoomSession {
    room_id: RoomId,
    viewer: UserId,
    resolved: ResolvedRoom,
    log: Arc<Mutex<MessageLog>>,
    pipeline: SendPipeline,
    realtime: Arc<dyn RealtimeFeed>,
    tokens: Arc<dyn TokenProvider>,
    closed: Arc<AtomicBool>,
    apply_task: JoinHandle<()>,
}

impl RoomSession {
    /// Open the room for the given viewer.
    ///
    /// Room resolution and history load failures abort the open and raise
    /// one alert. A failed channel join does not: the room stays usable
    /// without live updates.
    pub async fn open(
        room_id: RoomId,
        viewer: UserId,
        backend: Arc<dyn ChatBackend>,
        tokens: Arc<dyn TokenProvider>,
        realtime: Arc<dyn RealtimeFeed>,
        alerts: Arc<dyn AlertSink>,
        config: ChatConfig,
    ) -> ChatResult<Self> {
        let token = tokens.access_token().await?;

        let resolver = RoomResolver::new(Arc::clone(&backend));
        let resolved = match resolver.resolve(&room_id, &viewer, &token).await {
            Ok(resolved) => resolved,
            Err(e) => {
                alerts.alert(&format!("Could not open conversation: {}", e));
                return Err(e);
            }
        };

        let page = config.page_size.map(|limit| MessagePage {
            limit,
            before: None,
        });
        let history = match backend.fetch_messages(&room_id, page.as_ref(), &token).await {
            Ok(history) => history,
            Err(e) => {
                alerts.alert(&format!("Could not open conversation: {}", e));
                return Err(e.into());
            }
        };

        let mut log = MessageLog::new(viewer.clone(), config.echo_policy);
        log.replace_all(history);
        let log = Arc::new(Mutex::new(log));
        let closed = Arc::new(AtomicBool::new(false));

        // Subscribe before joining so an insert arriving right after the
        // join confirmation cannot be lost.
        let events = realtime.events();
        if let Err(e) = realtime.join_room(&room_id).await {
            tracing::warn!(room_id = %room_id, error = %e, "Room channel join failed; no live updates");
        }
        let apply_task = tokio::spawn(apply_realtime_events(
            events,
            Arc::clone(&log),
            room_id.clone(),
            Arc::clone(&closed),
        ));

        let pipeline = SendPipeline::new(
            backend,
            alerts,
            Arc::clone(&log),
            room_id.clone(),
            viewer.clone(),
            Arc::clone(&closed),
        );

        tracing::info!(room_id = %room_id, message_count = log.lock().expect("lock poisoned").len(), "Room opened");
        Ok(Self {
            room_id,
            viewer,
            resolved,
            log,
            pipeline,
            realtime,
            tokens,
            closed,
            apply_task,
        })
    }

    /// Close the view.
    ///
    /// Idempotent. Arms the close guard first, then leaves the channel and
    /// stops the apply task; anything still in flight completes without
    /// touching the log.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Err(e) = self.realtime.leave_room(&self.room_id).await {
            tracing::debug!(room_id = %self.room_id, error = %e, "Room channel leave failed");
        }
        self.apply_task.abort();
        tracing::info!(room_id = %self.room_id, "Room closed");
    }

    /// Send a message in this room.
    ///
    /// Empty or whitespace-only input returns `SendOutcome::Skipped` without
    /// fetching a token or touching the log.
    pub async fn send(&self, text: &str) -> ChatResult<SendOutcome> {
        if text.trim().is_empty() {
            return Ok(SendOutcome::Skipped);
        }
        let token = self.tokens.access_token().await?;
        self.pipeline.send(text, &token).await
    }

    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    pub fn viewer(&self) -> &UserId {
        &self.viewer
    }

    pub fn room(&self) -> &Room {
        &self.resolved.room
    }

    pub fn counterpart(&self) -> &CounterpartDisplay {
        &self.resolved.counterpart
    }

    /// Ordered copy of the current message sequence.
    pub fn messages(&self) -> Vec<Message> {
        self.log.lock().expect("lock poisoned").snapshot()
    }

    pub fn message_count(&self) -> usize {
        self.log.lock().expect("lock poisoned").len()
    }

    /// Watch channel carrying the log's revision counter.
    pub fn subscribe_changes(&self) -> watch::Receiver<u64> {
        self.log.lock().expect("lock poisoned").subscribe_changes()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for RoomSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoomSession")
            .field("room_id", &self.room_id)
            .field("viewer", &self.viewer)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

impl Drop for RoomSession {
    fn drop(&mut self) {
        self.apply_task.abort();
    }
}

/// Apply loop feeding realtime inserts into the log.
///
/// Inserts are additive only. The merge never resolves an optimistic entry;
/// duplicates and suppressed echoes are dropped inside the log.
async fn apply_realtime_events(
    mut events: broadcast::Receiver<RealtimeEvent>,
    log: Arc<Mutex<MessageLog>>,
    room_id: RoomId,
    closed: Arc<AtomicBool>,
) {
    loop {
        match events.recv().await {
            Ok(RealtimeEvent::MessageInserted { room_id: room, row }) if room == room_id => {
                if closed.load(Ordering::SeqCst) {
                    break;
                }
                let outcome = {
                    let mut log = log.lock().expect("lock poisoned");
                    log.apply_realtime_insert(row)
                };
                tracing::debug!(room_id = %room_id, outcome = ?outcome, "Merged realtime insert");
            }
            Ok(RealtimeEvent::SubscriptionConfirmed { room_id: room }) if room == room_id => {
                tracing::debug!(room_id = %room_id, "Live updates active");
            }
            Ok(_) => {}
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(room_id = %room_id, skipped, "Realtime apply loop lagged");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

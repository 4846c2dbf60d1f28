//! Shared in-memory fakes for the room view tests.
//!
//! The network-facing ports are replaced with recording fakes so every test
//! runs without sockets: `InMemoryBackend` plays the REST API,
//! `FakeRealtime` plays the websocket feed, `RecordingAlerts` captures
//! user-facing alerts and `StaticTokens` hands out a fixed access token.

use crate::config::ChatConfig;
use crate::error::ChatResult;
use crate::services::{AlertSink, RealtimeFeed, TokenProvider};
use crate::session::RoomSession;
use chat_types::{Message, MessageId, NewMessage, Profile, Room, RoomId, UserId};
use chrono::{DateTime, TimeZone, Utc};
use realtime_bridge::{RealtimeError, RealtimeEvent, RealtimeResult};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use supabase_backend::{BackendError, BackendResult, ChatBackend, MessagePage};
use tokio::sync::{broadcast, watch, Notify};

pub const ROOM: &str = "room-1";
pub const ALICE: &str = "alice";
pub const BOB: &str = "bob";

/// REST backend fake with per-operation failure switches and call counters.
pub struct InMemoryBackend {
    rooms: Mutex<HashMap<RoomId, Room>>,
    profiles: Mutex<HashMap<UserId, Profile>>,
    messages: Mutex<Vec<Message>>,
    next_id: AtomicI64,
    insert_calls: AtomicUsize,
    touch_calls: AtomicUsize,
    pub fail_inserts: AtomicBool,
    pub fail_history: AtomicBool,
    pub fail_profile_fetch: AtomicBool,
    pub fail_touches: AtomicBool,
    pub hold_inserts: AtomicBool,
    insert_release: Notify,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self {
            rooms: Mutex::new(HashMap::new()),
            profiles: Mutex::new(HashMap::new()),
            messages: Mutex::new(Vec::new()),
            next_id: AtomicI64::new(1),
            insert_calls: AtomicUsize::new(0),
            touch_calls: AtomicUsize::new(0),
            fail_inserts: AtomicBool::new(false),
            fail_history: AtomicBool::new(false),
            fail_profile_fetch: AtomicBool::new(false),
            fail_touches: AtomicBool::new(false),
            hold_inserts: AtomicBool::new(false),
            insert_release: Notify::new(),
        }
    }

    /// Release inserts blocked by `hold_inserts`.
    pub fn release_inserts(&self) {
        self.insert_release.notify_waiters();
    }

    pub fn add_room(&self, room: Room) {
        self.rooms
            .lock()
            .unwrap()
            .insert(room.id.clone(), room);
    }

    pub fn add_profile(&self, profile: Profile) {
        self.profiles
            .lock()
            .unwrap()
            .insert(profile.id.clone(), profile);
    }

    pub fn seed_messages(&self, messages: Vec<Message>) {
        self.messages.lock().unwrap().extend(messages);
    }

    pub fn stored_messages(&self) -> Vec<Message> {
        self.messages.lock().unwrap().clone()
    }

    pub fn insert_count(&self) -> usize {
        self.insert_calls.load(Ordering::SeqCst)
    }

    pub fn touch_count(&self) -> usize {
        self.touch_calls.load(Ordering::SeqCst)
    }

    pub fn room_last_activity(&self, room_id: &RoomId) -> Option<DateTime<Utc>> {
        self.rooms
            .lock()
            .unwrap()
            .get(room_id)
            .map(|r| r.last_activity_at)
    }
}

#[async_trait::async_trait]
impl ChatBackend for InMemoryBackend {
    async fn fetch_room(&self, room_id: &RoomId, _access_token: &str) -> BackendResult<Room> {
        self.rooms
            .lock()
            .unwrap()
            .get(room_id)
            .cloned()
            .ok_or(BackendError::NotFound { entity: "room" })
    }

    async fn fetch_profile(&self, user_id: &UserId, _access_token: &str) -> BackendResult<Profile> {
        if self.fail_profile_fetch.load(Ordering::SeqCst) {
            return Err(BackendError::NotFound { entity: "profile" });
        }
        self.profiles
            .lock()
            .unwrap()
            .get(user_id)
            .cloned()
            .ok_or(BackendError::NotFound { entity: "profile" })
    }

    async fn fetch_messages(
        &self,
        room_id: &RoomId,
        page: Option<&MessagePage>,
        _access_token: &str,
    ) -> BackendResult<Vec<Message>> {
        if self.fail_history.load(Ordering::SeqCst) {
            return Err(BackendError::NotFound { entity: "message" });
        }
        let mut rows: Vec<Message> = self
            .messages
            .lock()
            .unwrap()
            .iter()
            .filter(|m| &m.room_id == room_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        if let Some(page) = page {
            if let Some(before) = page.before {
                rows.retain(|m| m.created_at < before);
            }
            let skip = rows.len().saturating_sub(page.limit);
            rows.drain(..skip);
        }
        Ok(rows)
    }

    async fn insert_message(
        &self,
        message: &NewMessage,
        _access_token: &str,
    ) -> BackendResult<Message> {
        self.insert_calls.fetch_add(1, Ordering::SeqCst);
        if self.hold_inserts.load(Ordering::SeqCst) {
            self.insert_release.notified().await;
        }
        if self.fail_inserts.load(Ordering::SeqCst) {
            return Err(BackendError::EmptyInsert);
        }
        let stored = Message {
            id: MessageId(self.next_id.fetch_add(1, Ordering::SeqCst)),
            room_id: message.room_id.clone(),
            sender_id: message.sender_id.clone(),
            content: message.content.clone(),
            created_at: Utc::now(),
        };
        self.messages.lock().unwrap().push(stored.clone());
        Ok(stored)
    }

    async fn touch_room(
        &self,
        room_id: &RoomId,
        at: DateTime<Utc>,
        _access_token: &str,
    ) -> BackendResult<()> {
        self.touch_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_touches.load(Ordering::SeqCst) {
            return Err(BackendError::NotFound { entity: "room" });
        }
        if let Some(room) = self.rooms.lock().unwrap().get_mut(room_id) {
            room.last_activity_at = at;
        }
        Ok(())
    }
}

/// Captures every user-facing alert.
pub struct RecordingAlerts {
    alerts: Mutex<Vec<String>>,
}

impl RecordingAlerts {
    pub fn new() -> Self {
        Self {
            alerts: Mutex::new(Vec::new()),
        }
    }

    pub fn count(&self) -> usize {
        self.alerts.lock().unwrap().len()
    }

    pub fn alerts(&self) -> Vec<String> {
        self.alerts.lock().unwrap().clone()
    }
}

impl AlertSink for RecordingAlerts {
    fn alert(&self, message: &str) {
        self.alerts.lock().unwrap().push(message.to_string());
    }
}

/// Token provider returning one fixed token.
pub struct StaticTokens(pub &'static str);

#[async_trait::async_trait]
impl TokenProvider for StaticTokens {
    async fn access_token(&self) -> ChatResult<String> {
        Ok(self.0.to_string())
    }
}

/// Realtime feed fake driven by hand from the test body.
pub struct FakeRealtime {
    tx: broadcast::Sender<RealtimeEvent>,
    joined: Mutex<Vec<RoomId>>,
    left: Mutex<Vec<RoomId>>,
    pub fail_joins: AtomicBool,
}

impl FakeRealtime {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(100);
        Self {
            tx,
            joined: Mutex::new(Vec::new()),
            left: Mutex::new(Vec::new()),
            fail_joins: AtomicBool::new(false),
        }
    }

    /// Push an insert event into the feed as the server would.
    pub fn emit_insert(&self, room_id: &str, row: Message) {
        let _ = self.tx.send(RealtimeEvent::MessageInserted {
            room_id: RoomId::from_string(room_id),
            row,
        });
    }

    pub fn joined_rooms(&self) -> Vec<RoomId> {
        self.joined.lock().unwrap().clone()
    }

    pub fn left_rooms(&self) -> Vec<RoomId> {
        self.left.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl RealtimeFeed for FakeRealtime {
    fn events(&self) -> broadcast::Receiver<RealtimeEvent> {
        self.tx.subscribe()
    }

    async fn join_room(&self, room_id: &RoomId) -> RealtimeResult<()> {
        if self.fail_joins.load(Ordering::SeqCst) {
            return Err(RealtimeError::NotConnected);
        }
        self.joined.lock().unwrap().push(room_id.clone());
        Ok(())
    }

    async fn leave_room(&self, room_id: &RoomId) -> RealtimeResult<()> {
        self.left.lock().unwrap().push(room_id.clone());
        Ok(())
    }
}

pub fn room_between(a: &str, b: &str) -> Room {
    Room {
        id: RoomId::from_string(ROOM),
        user_a_id: UserId::from_string(a),
        user_b_id: UserId::from_string(b),
        last_activity_at: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
    }
}

pub fn profile(id: &str, first: &str, last: &str) -> Profile {
    Profile {
        id: UserId::from_string(id),
        first_name: first.to_string(),
        last_name: last.to_string(),
        avatar_url: None,
    }
}

/// Server-shaped message row with a deterministic timestamp offset.
pub fn server_msg(id: i64, sender: &str, secs: i64) -> Message {
    Message {
        id: MessageId(id),
        room_id: RoomId::from_string(ROOM),
        sender_id: UserId::from_string(sender),
        content: format!("message {}", id),
        created_at: Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap(),
    }
}

/// Standard two-person setup: room, both profiles, no history.
pub fn seeded_backend() -> Arc<InMemoryBackend> {
    let backend = InMemoryBackend::new();
    backend.add_room(room_between(ALICE, BOB));
    backend.add_profile(profile(ALICE, "Alice", "Archer"));
    backend.add_profile(profile(BOB, "Bob", "Breaker"));
    Arc::new(backend)
}

/// Open a room view for `viewer` against the given fakes.
pub async fn open_room(
    backend: &Arc<InMemoryBackend>,
    realtime: &Arc<FakeRealtime>,
    alerts: &Arc<RecordingAlerts>,
    config: ChatConfig,
    viewer: &str,
) -> ChatResult<RoomSession> {
    RoomSession::open(
        RoomId::from_string(ROOM),
        UserId::from_string(viewer),
        Arc::clone(backend) as Arc<dyn ChatBackend>,
        Arc::new(StaticTokens("token-1")) as Arc<dyn TokenProvider>,
        Arc::clone(realtime) as Arc<dyn RealtimeFeed>,
        Arc::clone(alerts) as Arc<dyn AlertSink>,
        config,
    )
    .await
}

/// Wait until the log revision reaches `at_least`.
pub async fn wait_for_revision(rx: &mut watch::Receiver<u64>, at_least: u64) {
    tokio::time::timeout(Duration::from_secs(1), async {
        while *rx.borrow_and_update() < at_least {
            rx.changed().await.expect("log dropped");
        }
    })
    .await
    .expect("timed out waiting for log revision");
}

/// Give the background apply task a moment to run when no visible change is
/// expected.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

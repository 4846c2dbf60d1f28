//! Phoenix channel protocol messages.
//!
//! The realtime socket speaks the Phoenix wire format: every frame is a
//! `{topic, event, payload, ref}` object. Room subscriptions join the topic
//! `realtime:public:messages:room_id=eq.{room_id}` and receive one `INSERT`
//! event per committed message row.

use chat_types::RoomId;
use serde::{Deserialize, Serialize};

/// Topic prefix for room-scoped message-insert channels.
const ROOM_TOPIC_PREFIX: &str = "realtime:public:messages:room_id=eq.";

/// Topic used for socket-level heartbeats.
pub const HEARTBEAT_TOPIC: &str = "phoenix";

/// Phoenix channel events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelEvent {
    // Channel lifecycle
    #[serde(rename = "phx_join")]
    Join,
    #[serde(rename = "phx_reply")]
    Reply,
    #[serde(rename = "phx_leave")]
    Leave,
    #[serde(rename = "phx_error")]
    ChannelError,
    #[serde(rename = "phx_close")]
    Close,

    // Keepalive
    #[serde(rename = "heartbeat")]
    Heartbeat,

    // Postgres change notifications
    #[serde(rename = "INSERT")]
    Insert,
    #[serde(rename = "UPDATE")]
    Update,
    #[serde(rename = "DELETE")]
    Delete,

    /// Any event this client does not handle (presence, broadcast).
    #[serde(other)]
    Unknown,
}

/// A message sent to/from the realtime socket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelMessage {
    pub topic: String,
    pub event: ChannelEvent,
    #[serde(default)]
    pub payload: serde_json::Value,
    #[serde(rename = "ref")]
    pub reference: Option<String>,
}

impl ChannelMessage {
    /// Create a join message for a topic.
    pub fn join(topic: &str, reference: &str) -> Self {
        Self {
            topic: topic.to_string(),
            event: ChannelEvent::Join,
            payload: serde_json::json!({}),
            reference: Some(reference.to_string()),
        }
    }

    /// Create a leave message for a topic.
    pub fn leave(topic: &str, reference: &str) -> Self {
        Self {
            topic: topic.to_string(),
            event: ChannelEvent::Leave,
            payload: serde_json::json!({}),
            reference: Some(reference.to_string()),
        }
    }

    /// Create a socket heartbeat message.
    pub fn heartbeat(reference: &str) -> Self {
        Self {
            topic: HEARTBEAT_TOPIC.to_string(),
            event: ChannelEvent::Heartbeat,
            payload: serde_json::json!({}),
            reference: Some(reference.to_string()),
        }
    }

    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Build the channel topic for a room's message inserts.
pub fn room_topic(room_id: &RoomId) -> String {
    format!("{}{}", ROOM_TOPIC_PREFIX, room_id)
}

/// Recover the room identifier from a channel topic.
///
/// Returns `None` for topics outside the room-message namespace (heartbeat
/// topic, presence channels).
pub fn room_from_topic(topic: &str) -> Option<RoomId> {
    topic
        .strip_prefix(ROOM_TOPIC_PREFIX)
        .filter(|rest| !rest.is_empty())
        .map(RoomId::from_string)
}

/// Reply payload for join/leave acknowledgements.
#[derive(Debug, Clone, Deserialize)]
pub struct ReplyPayload {
    pub status: String,
    #[serde(default)]
    pub response: serde_json::Value,
}

impl ReplyPayload {
    /// Returns true for an `ok` status.
    pub fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}

/// Postgres change payload carried by INSERT/UPDATE/DELETE events.
#[derive(Debug, Clone, Deserialize)]
pub struct ChangePayload {
    /// The changed row.
    #[serde(default)]
    pub record: Option<serde_json::Value>,
    #[serde(default)]
    pub table: Option<String>,
    #[serde(rename = "type", default)]
    pub change_type: Option<String>,
    #[serde(default)]
    pub commit_timestamp: Option<String>,
}

//! Core types for the two-party chat flow.
//!
//! These mirror the backend's row shapes for the `rooms`, `messages`, and
//! `users` tables, plus the local-only placeholder conventions used by the
//! optimistic send pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a chat room (UUID string).
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(pub String);

impl RoomId {
    /// Creates a new random room ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Creates a room ID from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Returns the room ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RoomId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RoomId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for RoomId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for RoomId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Unique identifier for a user (UUID string assigned by the auth backend).
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    /// Creates a new random user ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Creates a user ID from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Returns the user ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for UserId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Identifier for a message.
///
/// Server-assigned identifiers are positive integers. The send pipeline
/// synthesizes negative identifiers for optimistic entries so the two spaces
/// can never collide.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub i64);

impl MessageId {
    /// Returns true for locally synthesized placeholder identifiers.
    pub fn is_placeholder(&self) -> bool {
        self.0 < 0
    }

    /// Returns the raw identifier value.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for MessageId {
    fn from(v: i64) -> Self {
        Self(v)
    }
}

// ============================================================================
// Message types
// ============================================================================

/// A chat message, as stored in the `messages` table.
///
/// Within a room, display order is by `created_at` ascending; optimistic
/// entries carry a local wall-clock timestamp and sit at the tail.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub room_id: RoomId,
    pub sender_id: UserId,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// Returns true if this entry was synthesized locally and has not been
    /// assigned a server identifier.
    pub fn is_placeholder(&self) -> bool {
        self.id.is_placeholder()
    }
}

/// A message to be inserted.
///
/// The identifier and creation timestamp are assigned by the backend on
/// insert. Callers never provide either.
#[derive(Clone, Debug, Serialize)]
pub struct NewMessage {
    pub room_id: RoomId,
    pub sender_id: UserId,
    pub content: String,
}

impl NewMessage {
    pub fn new(
        room_id: impl Into<RoomId>,
        sender_id: impl Into<UserId>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            room_id: room_id.into(),
            sender_id: sender_id.into(),
            content: content.into(),
        }
    }
}

// ============================================================================
// Room types
// ============================================================================

/// One of the two fixed participant slots of a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParticipantSlot {
    A,
    B,
}

impl ParticipantSlot {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::A => "a",
            Self::B => "b",
        }
    }
}

/// A chat room, as stored in the `rooms` table.
///
/// Exactly two participants, held in fixed A/B slots. The slots are storage
/// positions only; they carry no ordering semantics.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Room {
    pub id: RoomId,
    pub user_a_id: UserId,
    pub user_b_id: UserId,
    pub last_activity_at: DateTime<Utc>,
}

impl Room {
    /// Returns the slot the given user occupies, if any.
    pub fn slot_of(&self, user: &UserId) -> Option<ParticipantSlot> {
        if &self.user_a_id == user {
            Some(ParticipantSlot::A)
        } else if &self.user_b_id == user {
            Some(ParticipantSlot::B)
        } else {
            None
        }
    }

    /// Returns the participant in the given slot.
    pub fn participant(&self, slot: ParticipantSlot) -> &UserId {
        match slot {
            ParticipantSlot::A => &self.user_a_id,
            ParticipantSlot::B => &self.user_b_id,
        }
    }

    /// Returns the other party for the given viewer: whichever slot does not
    /// match the viewer's identity. `None` if the viewer occupies neither
    /// slot.
    pub fn counterpart_of(&self, viewer: &UserId) -> Option<&UserId> {
        match self.slot_of(viewer)? {
            ParticipantSlot::A => Some(&self.user_b_id),
            ParticipantSlot::B => Some(&self.user_a_id),
        }
    }
}

// ============================================================================
// Profile types
// ============================================================================

/// A participant profile, as stored in the `users` table.
///
/// Fetched once per room view and not kept in sync thereafter.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: UserId,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

impl Profile {
    /// Full display name, with empty name parts collapsed.
    pub fn display_name(&self) -> String {
        let mut parts = Vec::new();
        if !self.first_name.trim().is_empty() {
            parts.push(self.first_name.trim());
        }
        if !self.last_name.trim().is_empty() {
            parts.push(self.last_name.trim());
        }
        parts.join(" ")
    }
}

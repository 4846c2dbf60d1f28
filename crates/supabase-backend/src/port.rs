//! Backend port consumed by the chat flow.
//!
//! The room view, message log, and send pipeline talk to this trait rather
//! than to [`SupabaseClient`](crate::SupabaseClient) directly, so tests can
//! substitute recording fakes.

use crate::client::{MessagePage, SupabaseClient};
use crate::error::BackendResult;
use chat_types::{Message, NewMessage, Profile, Room, RoomId, UserId};
use chrono::{DateTime, Utc};

/// Chat-facing backend operations.
///
/// Every call carries the viewer's access token; the backend enforces
/// row-level access with it, which is why there is no session state here.
#[async_trait::async_trait]
pub trait ChatBackend: Send + Sync {
    /// Fetch a room row by id.
    async fn fetch_room(&self, room_id: &RoomId, access_token: &str) -> BackendResult<Room>;

    /// Fetch a participant profile by user id.
    async fn fetch_profile(&self, user_id: &UserId, access_token: &str) -> BackendResult<Profile>;

    /// Fetch a room's message history in ascending creation order.
    async fn fetch_messages(
        &self,
        room_id: &RoomId,
        page: Option<&MessagePage>,
        access_token: &str,
    ) -> BackendResult<Vec<Message>>;

    /// Insert a message and return the stored row.
    async fn insert_message(
        &self,
        message: &NewMessage,
        access_token: &str,
    ) -> BackendResult<Message>;

    /// Update a room's last-activity timestamp.
    async fn touch_room(
        &self,
        room_id: &RoomId,
        at: DateTime<Utc>,
        access_token: &str,
    ) -> BackendResult<()>;
}

#[async_trait::async_trait]
impl ChatBackend for SupabaseClient {
    async fn fetch_room(&self, room_id: &RoomId, access_token: &str) -> BackendResult<Room> {
        SupabaseClient::fetch_room(self, room_id, access_token).await
    }

    async fn fetch_profile(&self, user_id: &UserId, access_token: &str) -> BackendResult<Profile> {
        SupabaseClient::fetch_profile(self, user_id, access_token).await
    }

    async fn fetch_messages(
        &self,
        room_id: &RoomId,
        page: Option<&MessagePage>,
        access_token: &str,
    ) -> BackendResult<Vec<Message>> {
        SupabaseClient::fetch_messages(self, room_id, page, access_token).await
    }

    async fn insert_message(
        &self,
        message: &NewMessage,
        access_token: &str,
    ) -> BackendResult<Message> {
        SupabaseClient::insert_message(self, message, access_token).await
    }

    async fn touch_room(
        &self,
        room_id: &RoomId,
        at: DateTime<Utc>,
        access_token: &str,
    ) -> BackendResult<()> {
        SupabaseClient::touch_room(self, room_id, at, access_token).await
    }
}

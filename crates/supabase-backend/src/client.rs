//! Supabase REST API client for the chat tables.
//!
//! Three logical tables back the chat flow:
//! - `rooms`: two participant columns plus a last-activity timestamp
//! - `messages`: room, sender, content, server-assigned id and timestamp
//! - `users`: profile rows (name fields, avatar URL)
//!
//! Plus the storage endpoint for avatar uploads.

use crate::error::{BackendError, BackendResult};
use chat_types::{Message, NewMessage, Profile, Room, RoomId, UserId};
use chrono::{DateTime, Utc};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Storage bucket holding profile avatars.
const AVATARS_BUCKET: &str = "avatars";

/// Columns selected for room rows.
const ROOM_COLUMNS: &str = "id,user_a_id,user_b_id,last_activity_at";

/// Columns selected for message rows.
const MESSAGE_COLUMNS: &str = "id,room_id,sender_id,content,created_at";

/// Columns selected for profile rows.
const PROFILE_COLUMNS: &str = "id,first_name,last_name,avatar_url";

fn summarize_response_body(body: &str) -> String {
    let mut hasher = DefaultHasher::new();
    body.hash(&mut hasher);
    format!("len={},digest={:016x}", body.len(), hasher.finish())
}

/// A history window for the initial message load.
///
/// `None` at the call site means full history, which is the default contract:
/// the whole room is fetched every time a room view opens. A page bounds the
/// load to the most recent `limit` rows, optionally older than `before`.
#[derive(Debug, Clone)]
pub struct MessagePage {
    /// Maximum number of rows to return.
    pub limit: usize,
    /// Only rows created strictly before this instant.
    pub before: Option<DateTime<Utc>>,
}

/// Supabase REST API client for chat room, message, and profile operations.
#[derive(Clone)]
pub struct SupabaseClient {
    http_client: reqwest::Client,
    api_url: String,
    anon_key: String,
}

impl SupabaseClient {
    /// Create a new Supabase client.
    ///
    /// # Arguments
    /// * `api_url` - The Supabase project API URL (e.g., `https://xyz.supabase.co`)
    /// * `anon_key` - The Supabase anonymous API key
    pub fn new(api_url: impl Into<String>, anon_key: impl Into<String>) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            api_url: api_url.into(),
            anon_key: anon_key.into(),
        }
    }

    /// Build the REST API URL for a table.
    fn rest_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.api_url, table)
    }

    /// Build the storage upload URL for an object path.
    fn storage_url(&self, path: &str) -> String {
        format!("{}/storage/v1/object/{}", self.api_url, path)
    }

    /// Build the publicly resolvable URL for an uploaded object.
    fn public_object_url(&self, path: &str) -> String {
        format!("{}/storage/v1/object/public/{}", self.api_url, path)
    }

    /// Build the query URL for a room's message history.
    ///
    /// Full history is ordered ascending straight from the backend. A paged
    /// load asks for the newest rows first (descending plus limit) and the
    /// caller flips them back, since PostgREST's `limit` takes rows from the
    /// front of the ordering.
    fn messages_url(&self, room_id: &RoomId, page: Option<&MessagePage>) -> String {
        let base = format!(
            "{}?room_id=eq.{}&select={}",
            self.rest_url("messages"),
            room_id,
            MESSAGE_COLUMNS
        );

        match page {
            None => format!("{base}&order=created_at.asc"),
            Some(page) => {
                let mut url = format!("{base}&order=created_at.desc&limit={}", page.limit);
                if let Some(before) = page.before {
                    url.push_str(&format!("&created_at=lt.{}", before.to_rfc3339()));
                }
                url
            }
        }
    }

    /// Fetch a single room row.
    ///
    /// Returns `NotFound` when the row set comes back empty. A missing row
    /// and a row hidden by row-level security are the same from here.
    pub async fn fetch_room(&self, room_id: &RoomId, access_token: &str) -> BackendResult<Room> {
        let url = format!(
            "{}?id=eq.{}&select={}&limit=1",
            self.rest_url("rooms"),
            room_id,
            ROOM_COLUMNS
        );

        tracing::debug!(room_id = %room_id, "Fetching room from Supabase");

        let response = self
            .http_client
            .get(&url)
            .header("apikey", &self.anon_key)
            .header("Authorization", format!("Bearer {}", access_token))
            .header("Accept", "application/json")
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let body_summary = summarize_response_body(&body);
            tracing::error!(status = %status, body_summary = %body_summary, "Failed to fetch room");
            return Err(BackendError::Api {
                operation: "fetch room",
                status,
                body_summary,
            });
        }

        let rooms: Vec<Room> = response.json().await?;
        rooms
            .into_iter()
            .next()
            .ok_or(BackendError::NotFound { entity: "room" })
    }

    /// Fetch a participant profile row.
    pub async fn fetch_profile(
        &self,
        user_id: &UserId,
        access_token: &str,
    ) -> BackendResult<Profile> {
        let url = format!(
            "{}?id=eq.{}&select={}&limit=1",
            self.rest_url("users"),
            user_id,
            PROFILE_COLUMNS
        );

        tracing::debug!(user_id = %user_id, "Fetching profile from Supabase");

        let response = self
            .http_client
            .get(&url)
            .header("apikey", &self.anon_key)
            .header("Authorization", format!("Bearer {}", access_token))
            .header("Accept", "application/json")
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let body_summary = summarize_response_body(&body);
            tracing::error!(status = %status, body_summary = %body_summary, "Failed to fetch profile");
            return Err(BackendError::Api {
                operation: "fetch profile",
                status,
                body_summary,
            });
        }

        let profiles: Vec<Profile> = response.json().await?;
        profiles
            .into_iter()
            .next()
            .ok_or(BackendError::NotFound { entity: "profile" })
    }

    /// Fetch a room's message history, ascending by creation timestamp.
    ///
    /// With `page: None` this is the full-history load the room view
    /// performs on open. With a page, only the newest `limit` rows (older
    /// than the cursor, if given) are returned, still in ascending order.
    pub async fn fetch_messages(
        &self,
        room_id: &RoomId,
        page: Option<&MessagePage>,
        access_token: &str,
    ) -> BackendResult<Vec<Message>> {
        let url = self.messages_url(room_id, page);

        tracing::debug!(room_id = %room_id, paged = page.is_some(), "Fetching messages from Supabase");

        let response = self
            .http_client
            .get(&url)
            .header("apikey", &self.anon_key)
            .header("Authorization", format!("Bearer {}", access_token))
            .header("Accept", "application/json")
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let body_summary = summarize_response_body(&body);
            tracing::error!(status = %status, body_summary = %body_summary, "Failed to fetch messages");
            return Err(BackendError::Api {
                operation: "fetch messages",
                status,
                body_summary,
            });
        }

        let mut messages: Vec<Message> = response.json().await?;
        if page.is_some() {
            // Paged rows arrive newest-first; callers always see ascending.
            messages.reverse();
        }

        tracing::debug!(room_id = %room_id, count = messages.len(), "Fetched messages");
        Ok(messages)
    }

    /// Insert a message row and return the stored representation.
    ///
    /// The returned row carries the server-assigned identifier and creation
    /// timestamp; the send pipeline uses it to confirm the optimistic entry.
    pub async fn insert_message(
        &self,
        message: &NewMessage,
        access_token: &str,
    ) -> BackendResult<Message> {
        let url = self.rest_url("messages");

        tracing::debug!(room_id = %message.room_id, "Inserting message into Supabase");

        let response = self
            .http_client
            .post(&url)
            .header("apikey", &self.anon_key)
            .header("Authorization", format!("Bearer {}", access_token))
            .header("Content-Type", "application/json")
            .header("Prefer", "return=representation")
            .json(message)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let body_summary = summarize_response_body(&body);
            tracing::error!(status = %status, body_summary = %body_summary, "Failed to insert message");
            return Err(BackendError::Api {
                operation: "insert message",
                status,
                body_summary,
            });
        }

        let rows: Vec<Message> = response.json().await?;
        let stored = rows.into_iter().next().ok_or(BackendError::EmptyInsert)?;

        tracing::debug!(room_id = %message.room_id, message_id = %stored.id, "Message inserted");
        Ok(stored)
    }

    /// Update a room's last-activity timestamp.
    pub async fn touch_room(
        &self,
        room_id: &RoomId,
        at: DateTime<Utc>,
        access_token: &str,
    ) -> BackendResult<()> {
        let url = format!("{}?id=eq.{}", self.rest_url("rooms"), room_id);

        let body = serde_json::json!({
            "last_activity_at": at.to_rfc3339(),
        });

        tracing::debug!(room_id = %room_id, "Touching room activity in Supabase");

        let response = self
            .http_client
            .patch(&url)
            .header("apikey", &self.anon_key)
            .header("Authorization", format!("Bearer {}", access_token))
            .header("Content-Type", "application/json")
            .header("Prefer", "return=minimal")
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let body_summary = summarize_response_body(&body);
            tracing::error!(status = %status, body_summary = %body_summary, "Failed to touch room");
            return Err(BackendError::Api {
                operation: "touch room",
                status,
                body_summary,
            });
        }

        Ok(())
    }

    /// Upload avatar image data and return its public URL.
    ///
    /// Objects are namespaced under the owner's user id with a random file
    /// name, so uploads never overwrite each other.
    pub async fn upload_avatar(
        &self,
        user_id: &UserId,
        bytes: Vec<u8>,
        content_type: &str,
        access_token: &str,
    ) -> BackendResult<String> {
        let object_path = format!(
            "{}/{}/{}.{}",
            AVATARS_BUCKET,
            user_id,
            uuid::Uuid::new_v4(),
            extension_for(content_type)
        );
        let url = self.storage_url(&object_path);

        tracing::debug!(user_id = %user_id, size = bytes.len(), "Uploading avatar to Supabase storage");

        let response = self
            .http_client
            .post(&url)
            .header("apikey", &self.anon_key)
            .header("Authorization", format!("Bearer {}", access_token))
            .header("Content-Type", content_type.to_string())
            .body(bytes)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let body_summary = summarize_response_body(&body);
            tracing::error!(status = %status, body_summary = %body_summary, "Failed to upload avatar");
            return Err(BackendError::Api {
                operation: "upload avatar",
                status,
                body_summary,
            });
        }

        let public_url = self.public_object_url(&object_path);
        tracing::info!(user_id = %user_id, "Avatar uploaded");
        Ok(public_url)
    }
}

/// File extension for a handful of image content types.
fn extension_for(content_type: &str) -> &'static str {
    match content_type {
        "image/png" => "png",
        "image/jpeg" => "jpg",
        "image/webp" => "webp",
        "image/gif" => "gif",
        _ => "bin",
    }
}

//! Room resolution and counterpart display.

use crate::error::ChatResult;
use chat_types::{Profile, Room, RoomId, UserId};
use std::sync::Arc;
use supabase_backend::ChatBackend;
use tracing::{debug, warn};

/// Header display state for the other participant.
///
/// A failed profile fetch leaves this `Loading` for the life of the room
/// view; the conversation itself stays usable.
#[derive(Debug, Clone, PartialEq)]
pub enum CounterpartDisplay {
    Loading,
    Named(Profile),
}

impl CounterpartDisplay {
    /// Display name, once the profile has arrived.
    pub fn name(&self) -> Option<String> {
        match self {
            CounterpartDisplay::Loading => None,
            CounterpartDisplay::Named(profile) => Some(profile.display_name()),
        }
    }
}

/// A room resolved for a specific viewer.
#[derive(Debug, Clone)]
pub struct ResolvedRoom {
    pub room: Room,
    /// The participant slot not matching the viewer; `None` when the viewer
    /// occupies neither slot.
    pub counterpart_id: Option<UserId>,
    pub counterpart: CounterpartDisplay,
}

/// Resolves a room row and its counterpart profile for the room header.
pub struct RoomResolver {
    backend: Arc<dyn ChatBackend>,
}

impl RoomResolver {
    pub fn new(backend: Arc<dyn ChatBackend>) -> Self {
        Self { backend }
    }

    /// Fetch the room row and the counterpart's profile.
    ///
    /// A missing room, or one hidden by access rules, fails with the
    /// backend's `NotFound`. A failed profile fetch is not retried; the
    /// counterpart display stays `Loading`.
    pub async fn resolve(
        &self,
        room_id: &RoomId,
        viewer: &UserId,
        access_token: &str,
    ) -> ChatResult<ResolvedRoom> {
        let room = self.backend.fetch_room(room_id, access_token).await?;

        let counterpart_id = room.counterpart_of(viewer).cloned();
        let counterpart = match &counterpart_id {
            Some(user_id) => {
                match self.backend.fetch_profile(user_id, access_token).await {
                    Ok(profile) => {
                        debug!(room_id = %room_id, counterpart = %user_id, "Counterpart profile loaded");
                        CounterpartDisplay::Named(profile)
                    }
                    Err(e) => {
                        warn!(
                            room_id = %room_id,
                            counterpart = %user_id,
                            error = %e,
                            "Counterpart profile fetch failed"
                        );
                        CounterpartDisplay::Loading
                    }
                }
            }
            None => {
                warn!(room_id = %room_id, viewer = %viewer, "Viewer is not a participant in this room");
                CounterpartDisplay::Loading
            }
        };

        Ok(ResolvedRoom {
            room,
            counterpart_id,
            counterpart,
        })
    }
}

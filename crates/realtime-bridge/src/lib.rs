//! Realtime websocket bridge for room message inserts.
//!
//! This crate provides:
//! - Phoenix-channel connection to the Supabase realtime socket
//! - Room-scoped subscriptions to committed message inserts
//! - Automatic reconnection with exponential backoff and channel rejoin
//! - Socket heartbeats on a fixed interval

mod client;
mod error;
mod messages;

pub use client::{
    websocket_url, ConnectionState, RealtimeClient, RealtimeConfig, RealtimeEvent,
};
pub use error::{RealtimeError, RealtimeResult};
pub use messages::{room_from_topic, room_topic, ChangePayload, ChannelEvent, ChannelMessage, ReplyPayload};

//! Supabase REST client for the chat backend.
//!
//! This crate provides:
//! - Row reads and writes over the `rooms`, `messages`, and `users` tables
//! - Avatar uploads to the storage bucket, returning a public URL
//! - The `ChatBackend` port that chat-core consumes, so tests can substitute
//!   an in-memory backend

mod client;
mod error;
mod port;

pub use client::{MessagePage, SupabaseClient};
pub use error::{BackendError, BackendResult};
pub use port::ChatBackend;

//! Chat flow error types.

use thiserror::Error;

/// Chat error type.
#[derive(Error, Debug)]
pub enum ChatError {
    /// Room view already closed
    #[error("Room is closed")]
    RoomClosed,

    /// Backend error
    #[error("Backend error: {0}")]
    Backend(#[from] supabase_backend::BackendError),

    /// Session error
    #[error("Session error: {0}")]
    Session(#[from] session_store::SessionError),

    /// Realtime error
    #[error("Realtime error: {0}")]
    Realtime(#[from] realtime_bridge::RealtimeError),
}

/// Result type alias using ChatError.
pub type ChatResult<T> = Result<T, ChatError>;

//! Realtime error types.

use thiserror::Error;

/// Realtime error type.
#[derive(Error, Debug)]
pub enum RealtimeError {
    /// Transport-level failure from the websocket stack
    #[error("websocket failure: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// The socket could not be brought up
    #[error("connection failed: {0}")]
    Connection(String),

    /// The operation needs a live socket and there is none
    #[error("not connected to the realtime socket")]
    NotConnected,

    /// A channel frame could not be encoded or decoded
    #[error("malformed channel frame: {0}")]
    Json(#[from] serde_json::Error),

    /// The writer task is gone; the outgoing frame was dropped
    #[error("could not queue outgoing frame: {0}")]
    Send(String),
}

/// Result type alias using RealtimeError.
pub type RealtimeResult<T> = Result<T, RealtimeError>;

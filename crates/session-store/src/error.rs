//! Error taxonomy for the session store.
//!
//! Only the refresh loop cares about the transient/permanent split; every
//! other caller treats a `SessionError` as terminal.

use thiserror::Error;

/// Session error type.
#[derive(Error, Debug)]
pub enum SessionError {
    /// The password grant was rejected
    #[error("invalid credentials: {0}")]
    InvalidCredentials(String),

    /// An operation needed a signed-in viewer
    #[error("not signed in")]
    NotSignedIn,

    /// The refresh grant was rejected
    #[error("token refresh failed: {0}")]
    TokenRefresh(String),

    /// Every refresh attempt failed
    #[error("token refresh failed after {0} attempts")]
    RefreshExhausted(u32),

    /// The auth FSM rejected the requested transition
    #[error("invalid auth state transition: {0}")]
    InvalidStateTransition(String),

    /// Transport failure talking to the auth endpoint
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The request ran out of time
    #[error("operation timed out")]
    Timeout,

    /// No route to the backend
    #[error("network unavailable")]
    NetworkUnavailable,
}

impl SessionError {
    /// True when the refresh loop may try again: the network is out, the
    /// request timed out, or the backend answered with a server error.
    pub fn is_transient(&self) -> bool {
        match self {
            SessionError::NetworkUnavailable | SessionError::Timeout => true,
            SessionError::Http(e) => {
                e.is_connect() || e.is_timeout() || e.status().is_some_and(|s| s.is_server_error())
            }
            _ => false,
        }
    }
}

/// Result type alias using SessionError.
pub type SessionResult<T> = Result<T, SessionError>;

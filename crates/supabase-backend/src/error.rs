//! Backend error types.
//!
//! The chat flow surfaces every backend failure the same way (one alert, no
//! retry), so there is no transient/permanent split in this taxonomy.

use thiserror::Error;

/// Backend error type.
#[derive(Error, Debug)]
pub enum BackendError {
    /// Network or protocol error from the HTTP client
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The requested row does not exist, or row-level security hid it.
    /// The two cases are indistinguishable to this client.
    #[error("{entity} not found")]
    NotFound { entity: &'static str },

    /// The backend answered with a non-success status
    #[error("backend rejected {operation}: {status} ({body_summary})")]
    Api {
        operation: &'static str,
        status: reqwest::StatusCode,
        body_summary: String,
    },

    /// An insert with `return=representation` came back empty
    #[error("insert returned no representation")]
    EmptyInsert,
}

/// Result type alias using BackendError.
pub type BackendResult<T> = Result<T, BackendError>;

//! Viewer session management for the chat workspace.
//!
//! This crate provides:
//! - Email/password sign-in against the Supabase auth endpoint
//! - In-memory session data with automatic token refresh
//! - Explicit FSM-based auth state management
//! - Watch-channel state notifications driving service lifecycle

mod auth_fsm;
mod error;
mod store;

pub use auth_fsm::session_machine;
pub use auth_fsm::{
    AuthState, RefreshConfig, SessionMachine, SessionMachineInput, SessionMachineState,
};
pub use error::{SessionError, SessionResult};
pub use store::{SessionStore, Viewer};

//! Authentication state machine using rust-fsm.
//!
//! Auth state is tracked explicitly instead of being derived from whether a
//! token happens to be present, so every observer sees the same lifecycle.
//!
//! ## State Diagram
//!
//! ```text
//! ┌─────────────┐
//! │  SignedOut  │ (initial)
//! └──────┬──────┘
//!        │ SignInAttempt
//!        ▼
//! ┌─────────────┐  SignInFailed
//! │  SigningIn  │ ─────────────► SignedOut
//! └──────┬──────┘
//!        │ SignInSuccess
//!        ▼
//! ┌─────────────┐  TokenExpired   ┌─────────────┐
//! │  SignedIn   │ ──────────────► │ Refreshing  │◄─┐ RefreshRetry
//! └──────┬──────┘                 └──────┬──────┘──┘
//!        │ SignOutRequested              │ RefreshSuccess ──► SignedIn
//!        ▼                               │ RefreshFailed  ──► SignedOut
//! ┌─────────────┐
//! │ SigningOut  │ ── SignOutComplete ──► SignedOut
//! └─────────────┘
//! ```

use rust_fsm::*;
use serde::{Deserialize, Serialize};
use std::time::Duration;

// Generates a module `session_machine` with State, Input, and StateMachine.
state_machine! {
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub session_machine(SignedOut)

    SignedOut => {
        SignInAttempt => SigningIn
    },
    SigningIn => {
        SignInSuccess => SignedIn,
        SignInFailed => SignedOut
    },
    SignedIn => {
        TokenExpired => Refreshing,
        SignOutRequested => SigningOut
    },
    Refreshing => {
        RefreshSuccess => SignedIn,
        RefreshRetry => Refreshing,
        RefreshFailed => SignedOut
    },
    SigningOut => {
        SignOutComplete => SignedOut
    }
}

// Re-export the generated types with clearer names
pub use session_machine::Input as SessionMachineInput;
pub use session_machine::State as SessionMachineState;
pub use session_machine::StateMachine as SessionMachine;

/// Auth state published to session observers.
///
/// A simplified view of the FSM state; the service layer keys its
/// initialize/teardown lifecycle off this.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthState {
    /// No viewer session.
    SignedOut,
    /// Credential exchange in flight.
    SigningIn,
    /// Signed in with a usable session.
    SignedIn,
    /// Access token expired, refresh in flight.
    Refreshing,
    /// Sign-out in flight.
    SigningOut,
}

impl AuthState {
    /// Returns true if a viewer session exists (SignedIn state only).
    pub fn is_authenticated(&self) -> bool {
        matches!(self, AuthState::SignedIn)
    }

    /// Returns true if the state is an in-progress state.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            AuthState::SigningIn | AuthState::Refreshing | AuthState::SigningOut
        )
    }
}

impl From<&SessionMachineState> for AuthState {
    fn from(state: &SessionMachineState) -> Self {
        match state {
            SessionMachineState::SignedOut => AuthState::SignedOut,
            SessionMachineState::SigningIn => AuthState::SigningIn,
            SessionMachineState::SignedIn => AuthState::SignedIn,
            SessionMachineState::Refreshing => AuthState::Refreshing,
            SessionMachineState::SigningOut => AuthState::SigningOut,
        }
    }
}

/// Configuration for retry behavior during token refresh.
#[derive(Debug, Clone)]
pub struct RefreshConfig {
    /// Maximum number of retry attempts.
    pub max_retries: u32,
    /// Initial delay between retries in milliseconds.
    pub initial_delay_ms: u64,
    /// Maximum delay between retries in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 500,
            max_delay_ms: 5000,
        }
    }
}

impl RefreshConfig {
    /// Calculate the delay for a given attempt number (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay_ms = self.initial_delay_ms.saturating_mul(2u64.pow(attempt));
        let capped_ms = delay_ms.min(self.max_delay_ms);
        Duration::from_millis(capped_ms)
    }
}

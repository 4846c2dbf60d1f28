//! Room conversation engine: history, optimistic sends and live updates.
//!
//! Non-negotiable behaviors:
//!
//! 1. The in-memory log is the only message store. The backend is the source
//!    of truth; the log is the view's working copy for one open room.
//! 2. Optimistic entries keep their negative placeholder id forever. A
//!    confirmed send never rewrites the entry and never swaps the id for the
//!    server one.
//! 3. Realtime inserts are additive only. They merge by server id and never
//!    resolve an optimistic entry.
//! 4. A failed send removes its placeholder and raises exactly one alert.
//!    There is no automatic retry.
//! 5. After close, nothing mutates the log and nothing alerts.
//!
//! Flow:
//!
//! ```text
//!   OPEN:  resolve room -> load history -> join channel
//!   SEND:  placeholder -> persist -> confirmed (touch room)
//!                                 \-> failed (remove + alert)
//!   LIVE:  insert event -> merge by id -> append in timestamp order
//!   CLOSE: arm guard -> leave channel -> stop apply loop
//! ```

mod config;
mod error;
mod log;
mod room;
mod send;
mod services;
mod session;

#[cfg(test)]
mod tests;

pub use config::{ChatConfig, EchoPolicy, DEFAULT_ECHO_WINDOW};
pub use error::{ChatError, ChatResult};
pub use log::{MergeOutcome, MessageLog};
pub use room::{CounterpartDisplay, ResolvedRoom, RoomResolver};
pub use send::{next_placeholder_id, SendOutcome, SendPipeline, SendState};
pub use services::{AlertSink, ChatServices, RealtimeFeed, TokenProvider, TracingAlerts};
pub use session::RoomSession;

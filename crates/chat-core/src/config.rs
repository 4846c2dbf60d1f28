//! Chat behavior configuration.

use std::time::Duration;

/// Default echo-suppression window.
pub const DEFAULT_ECHO_WINDOW: Duration = Duration::from_secs(10);

/// How realtime copies of the viewer's own confirmed sends are handled.
///
/// A confirmed optimistic entry keeps its placeholder identifier, so the
/// realtime echo of the same row is not a duplicate by id and would render
/// twice. `AppendAll` keeps that behavior; `SuppressOwnWindow` drops echoes
/// of sends confirmed within the window. Echoes are matched by the exact
/// server id returned from the send call, so rows sent from another device
/// under the same account still append.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EchoPolicy {
    /// Apply every realtime insert unconditionally.
    AppendAll,
    /// Drop realtime rows matching a send confirmed within the window.
    SuppressOwnWindow(Duration),
}

impl Default for EchoPolicy {
    fn default() -> Self {
        EchoPolicy::SuppressOwnWindow(DEFAULT_ECHO_WINDOW)
    }
}

/// Chat flow configuration.
#[derive(Debug, Clone)]
pub struct ChatConfig {
    /// History page size for the initial load; `None` loads the full history.
    pub page_size: Option<usize>,
    /// Realtime echo handling for the viewer's own sends.
    pub echo_policy: EchoPolicy,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            page_size: None,
            echo_policy: EchoPolicy::default(),
        }
    }
}

impl ChatConfig {
    /// Load configuration from the environment, falling back to defaults.
    ///
    /// Variables: `CHAT_PAGE_SIZE` (unset means full history),
    /// `CHAT_ECHO_POLICY` (`append-all` or `suppress-own`),
    /// `CHAT_ECHO_WINDOW_SECS`.
    pub fn from_env() -> Self {
        let page_size = std::env::var("CHAT_PAGE_SIZE")
            .ok()
            .and_then(|s| s.parse().ok());
        let window_secs = std::env::var("CHAT_ECHO_WINDOW_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_ECHO_WINDOW.as_secs());
        let echo_policy =
            echo_policy_from(std::env::var("CHAT_ECHO_POLICY").ok().as_deref(), window_secs);

        Self {
            page_size,
            echo_policy,
        }
    }
}

fn echo_policy_from(name: Option<&str>, window_secs: u64) -> EchoPolicy {
    match name {
        Some("append-all") => EchoPolicy::AppendAll,
        _ => EchoPolicy::SuppressOwnWindow(Duration::from_secs(window_secs)),
    }
}

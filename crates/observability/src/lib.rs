//! Tracing setup shared by the workspace's binaries and test harnesses.
//!
//! Every crate in the workspace logs through the standard `tracing` macros
//! and stays unaware of where the lines go. A binary picks the output shape
//! exactly once at startup:
//!
//! ```rust,ignore
//! fn main() {
//!     observability::init("chat-probe");
//! }
//! ```
//!
//! or, when the level or format comes from a flag:
//!
//! ```rust,ignore
//! observability::init_with_config(observability::LogConfig {
//!     service_name: "chat-probe".into(),
//!     default_level: cli.log_level.clone(),
//!     json: true,
//! });
//! ```

use tracing_subscriber::EnvFilter;

/// Subscriber settings for one process.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Service name recorded when the subscriber comes up.
    pub service_name: String,

    /// Level filter applied when `RUST_LOG` is unset.
    pub default_level: String,

    /// Emit structured JSON lines instead of the compact human format.
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            service_name: "unknown".into(),
            default_level: "info".into(),
            json: false,
        }
    }
}

/// Install the subscriber with defaults: compact format, `info` level.
pub fn init(service_name: &str) {
    init_with_config(LogConfig {
        service_name: service_name.into(),
        ..Default::default()
    });
}

/// Install the subscriber from an explicit [`LogConfig`].
///
/// `RUST_LOG` wins over `default_level` when set. Calling this a second
/// time in the same process is a no-op rather than a panic, so test
/// binaries may route through it freely.
pub fn init_with_config(config: LogConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.default_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    let installed = if config.json {
        builder.json().flatten_event(true).try_init()
    } else {
        builder.compact().try_init()
    };

    if installed.is_ok() {
        tracing::debug!(service = %config.service_name, "tracing initialized");
    }
}

// Callers that only log can depend on this crate alone.
pub use tracing::{debug, error, info, instrument, span, trace, warn, Level};

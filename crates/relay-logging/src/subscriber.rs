//! Global subscriber installation.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::types::LogLevel;

/// Build the event filter: `RUST_LOG` when set and valid, `level` otherwise.
pub fn build_filter(level: LogLevel) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_filter_str()))
}

/// Install the global `tracing` subscriber.
///
/// Returns `false` if a global subscriber was already installed (the new one
/// is discarded).
pub fn init_subscriber(level: LogLevel, json: bool) -> bool {
    let registry = tracing_subscriber::registry().with(build_filter(level));
    let result = if json {
        registry
            .with(fmt::layer().json().with_current_span(true))
            .try_init()
    } else {
        registry.with(fmt::layer().with_target(true)).try_init()
    };
    let installed = result.is_ok();
    if installed {
        tracing::debug!(%level, json, "log subscriber installed");
    }
    installed
}

//! Tracing subscriber installation
//!
//! The engine only emits `tracing` events; applications decide where they go.
//! Hosts that want structured logs can install this stack: an `EnvFilter`
//! driven by `LOG_LEVEL` (falling back to `RUST_LOG`, then `info`) and
//! JSON-formatted output.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::error::{Error, Result};

/// Environment variable consulted first for the log filter.
pub const LOG_LEVEL_ENV: &str = "LOG_LEVEL";

/// Build the log filter from `LOG_LEVEL`, then `RUST_LOG`, then `info`.
pub fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_LEVEL_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install a global JSON tracing subscriber.
///
/// Returns `Error::Telemetry` if a global subscriber is already installed.
pub fn init_tracing() -> Result<()> {
    tracing_subscriber::registry()
        .with(env_filter())
        .with(tracing_subscriber::fmt::layer().json())
        .try_init()
        .map_err(|e| Error::Telemetry(format!("failed to install subscriber: {e}")))
}

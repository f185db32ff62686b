//! Structured logging setup.
//!
//! `RUST_LOG` takes precedence; otherwise the configured level applies to
//! this crate. Registry diagnostics are raised to `debug` when enabled.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::ObservabilityConfig;

/// Log levels accepted in configuration.
pub const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Default filter directive for a configured level.
pub fn default_directive(config: &ObservabilityConfig, debug_log: bool) -> String {
    let mut directive = format!("conn_limit={level},connlimitd={level}", level = config.log_level);
    if debug_log {
        directive.push_str(",conn_limit::limiter=debug");
    }
    directive
}

/// Install the global subscriber. Returns an error if one is already set.
pub fn init(config: &ObservabilityConfig, debug_log: bool) -> Result<(), tracing_subscriber::util::TryInitError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(config, debug_log)));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()
}

//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

use crate::limiter::{AllowedConnections, ConnLimitRegistry};

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct LimiterConfig {
    /// Maximum distinct connected addresses per identifier.
    pub limits: Vec<AllowedConnections>,

    /// Emit a debug event for every registry operation.
    pub debug_log: bool,

    /// Gated listener settings (daemon only).
    pub listener: ListenerConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl LimiterConfig {
    /// Build the registry this configuration describes.
    pub fn build_registry(&self) -> ConnLimitRegistry {
        ConnLimitRegistry::new(self.limits.clone(), self.debug_log)
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:7070").
    pub bind_address: String,

    /// Identifier connections on this listener are counted under.
    pub identifier: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:7070".to_string(),
            identifier: "default".to_string(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

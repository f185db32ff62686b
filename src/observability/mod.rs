//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! limiter / net produce:
//!     → logging.rs (structured tracing events)
//!     → metrics.rs (admission counters)
//!
//! Consumers:
//!     → stdout via tracing-subscriber fmt layer
//!     → any `metrics` recorder the host process installs
//! ```
//!
//! # Design Decisions
//! - Registry diagnostics are opt-in (`debug_log`), lifecycle events are not
//! - Metric updates are no-ops until a recorder is installed

pub mod logging;
pub mod metrics;

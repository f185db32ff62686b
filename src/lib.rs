//! Per-identifier connection admission control.
//!
//! A [`ConnLimitRegistry`] caps how many distinct client addresses may hold
//! connections under an identifier at once. Addresses that are already
//! connected may always open more.

pub mod config;
pub mod lifecycle;
pub mod limiter;
pub mod net;
pub mod observability;

pub use config::LimiterConfig;
pub use lifecycle::shutdown::Shutdown;
pub use limiter::{AllowedConnections, ConnLimit, ConnLimitRegistry, PairingViolation, Policy};
pub use net::GatedListener;

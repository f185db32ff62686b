//! Connection admission subsystem.
//!
//! # Data Flow
//! ```text
//! Policy (identifier → max distinct addresses, immutable)
//!     → registry.rs (per-identifier address counters behind one RwLock)
//!     → can_establish / on_established / on_lost / try_establish
//!     → booleans back to the connection-handling layer
//! ```
//!
//! # Design Decisions
//! - Only *new* addresses are capped; an address that already holds a
//!   connection may always open more
//! - Counters that drop to zero are kept for the registry's lifetime
//! - A lost connection without a matching established one is a caller bug
//!   and panics (see [`PairingViolation`])

pub mod policy;
pub mod registry;
pub mod violation;

use std::net::IpAddr;

pub use policy::{AllowedConnections, Policy};
pub use registry::ConnLimitRegistry;
pub use violation::PairingViolation;

/// Admission control surface used by the connection-handling layer.
///
/// Implementations are shared by reference (`Arc<dyn ConnLimit>`) among all
/// connection tasks.
pub trait ConnLimit: Send + Sync {
    /// Whether a new connection from `addr` may be accepted under `id`.
    ///
    /// Read-only: does not reserve a slot.
    fn can_establish(&self, id: &str, addr: IpAddr) -> bool;

    /// Record an accepted connection. Always returns `true`; the admission
    /// decision belongs to a prior [`ConnLimit::can_establish`] call.
    fn on_established(&self, id: &str, addr: IpAddr) -> bool;

    /// Record a closed connection.
    ///
    /// # Panics
    /// If no matching established connection was recorded for the pair.
    fn on_lost(&self, id: &str, addr: IpAddr);

    /// Check and record in one exclusive section. Returns whether the
    /// connection was admitted; nothing is recorded on denial.
    fn try_establish(&self, id: &str, addr: IpAddr) -> bool;
}

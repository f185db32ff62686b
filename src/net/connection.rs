//! Connection identity and registry release.
//!
//! # Responsibilities
//! - Generate unique connection IDs for tracing
//! - Pair every recorded connection with exactly one `on_lost`

use std::net::IpAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::limiter::ConnLimit;

/// Global atomic counter for connection IDs.
/// Using relaxed ordering is sufficient since we only need uniqueness, not synchronization.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Generate a new unique connection ID.
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Guard for a connection already recorded in the registry.
/// Calls `on_lost` when dropped.
pub struct ConnectionGuard {
    registry: Arc<dyn ConnLimit>,
    identifier: String,
    peer: IpAddr,
    id: ConnectionId,
}

impl ConnectionGuard {
    /// Wrap a connection the caller has already recorded with
    /// `on_established` (or an admitting `try_establish`).
    pub fn recorded(registry: Arc<dyn ConnLimit>, identifier: impl Into<String>, peer: IpAddr) -> Self {
        Self {
            registry,
            identifier: identifier.into(),
            peer,
            id: ConnectionId::new(),
        }
    }

    /// Admit and record in one step; `None` when the registry denies `peer`.
    pub fn try_acquire(registry: Arc<dyn ConnLimit>, identifier: &str, peer: IpAddr) -> Option<Self> {
        registry
            .try_establish(identifier, peer)
            .then(|| Self::recorded(registry, identifier, peer))
    }

    /// Connection ID for log correlation.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Identifier the connection is counted under.
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Peer address passed to the registry.
    pub fn peer(&self) -> IpAddr {
        self.peer
    }
}

impl std::fmt::Debug for ConnectionGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionGuard")
            .field("identifier", &self.identifier)
            .field("peer", &self.peer)
            .field("id", &self.id)
            .finish()
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.registry.on_lost(&self.identifier, self.peer);
        tracing::trace!(connection_id = %self.id, peer = %self.peer, "Connection closed");
    }
}

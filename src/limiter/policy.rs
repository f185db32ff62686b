//! Static admission policy.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// One policy entry: at most `max_connections` distinct addresses may be
/// connected under `id` at the same time.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct AllowedConnections {
    /// Identifier (service, tenant, listener name).
    pub id: String,

    /// Maximum distinct concurrently-connected addresses.
    pub max_connections: u32,
}

impl AllowedConnections {
    /// Create a policy entry.
    pub fn new(id: impl Into<String>, max_connections: u32) -> Self {
        Self {
            id: id.into(),
            max_connections,
        }
    }
}

/// Immutable identifier → maximum mapping.
///
/// Identifiers without an entry have a maximum of 0. Later entries for the
/// same identifier replace earlier ones.
#[derive(Debug, Clone, Default)]
pub struct Policy {
    max_allowed: HashMap<String, u32>,
}

impl Policy {
    /// Build a policy from entries.
    pub fn new(allowed: impl IntoIterator<Item = AllowedConnections>) -> Self {
        allowed.into_iter().collect()
    }

    /// Maximum distinct addresses for `id`, 0 when `id` is not configured.
    pub fn max_allowed(&self, id: &str) -> u32 {
        self.max_allowed.get(id).copied().unwrap_or(0)
    }

    /// Whether `id` has an explicit entry.
    pub fn contains(&self, id: &str) -> bool {
        self.max_allowed.contains_key(id)
    }
}

impl FromIterator<AllowedConnections> for Policy {
    fn from_iter<I: IntoIterator<Item = AllowedConnections>>(iter: I) -> Self {
        let max_allowed = iter
            .into_iter()
            .map(|entry| (entry.id, entry.max_connections))
            .collect();
        Self { max_allowed }
    }
}

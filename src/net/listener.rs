//! TCP listener gated by the connection registry.
//!
//! # Responsibilities
//! - Bind to the configured address
//! - Accept incoming TCP connections
//! - Admit peers through the shared registry under one identifier
//! - Close denied peers and keep accepting

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};

use crate::config::ListenerConfig;
use crate::limiter::ConnLimit;
use crate::net::connection::ConnectionGuard;
use crate::observability::metrics;

/// Error type for listener operations.
#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    #[error("Failed to bind: {0}")]
    Bind(std::io::Error),

    #[error("Failed to accept: {0}")]
    Accept(std::io::Error),
}

/// A TCP listener that only hands out connections the registry admits.
pub struct GatedListener {
    inner: TcpListener,
    registry: Arc<dyn ConnLimit>,
    identifier: String,
}

impl GatedListener {
    /// Bind to the configured address.
    pub async fn bind(config: &ListenerConfig, registry: Arc<dyn ConnLimit>) -> Result<Self, ListenerError> {
        let addr: SocketAddr = config.bind_address.parse().map_err(|e| {
            ListenerError::Bind(std::io::Error::new(std::io::ErrorKind::InvalidInput, e))
        })?;

        let listener = TcpListener::bind(addr).await.map_err(ListenerError::Bind)?;
        Ok(Self::from_listener(listener, registry, config.identifier.clone()))
    }

    /// Wrap an already bound listener.
    pub fn from_listener(inner: TcpListener, registry: Arc<dyn ConnLimit>, identifier: impl Into<String>) -> Self {
        let identifier = identifier.into();
        if let Ok(local_addr) = inner.local_addr() {
            tracing::info!(address = %local_addr, identifier = %identifier, "Listener bound");
        }

        Self {
            inner,
            registry,
            identifier,
        }
    }

    /// Accept the next admitted connection.
    ///
    /// Denied peers are dropped (closing their socket) without returning.
    /// The guard must be held for the connection's lifetime.
    pub async fn accept(&self) -> Result<(TcpStream, SocketAddr, ConnectionGuard), ListenerError> {
        loop {
            let (stream, peer) = self.inner.accept().await.map_err(ListenerError::Accept)?;

            match ConnectionGuard::try_acquire(Arc::clone(&self.registry), &self.identifier, peer.ip()) {
                Some(guard) => {
                    tracing::debug!(
                        connection_id = %guard.id(),
                        peer_addr = %peer,
                        identifier = %self.identifier,
                        "Connection admitted"
                    );
                    return Ok((stream, peer, guard));
                }
                None => {
                    tracing::warn!(peer_addr = %peer, identifier = %self.identifier, "Connection limit reached, closing");
                    metrics::record_rejected(&self.identifier);
                    drop(stream);
                }
            }
        }
    }

    /// Get the local address this listener is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, std::io::Error> {
        self.inner.local_addr()
    }

    /// Identifier every accepted connection is counted under.
    pub fn identifier(&self) -> &str {
        &self.identifier
    }
}

//! Startup orchestration and the accept loop.
//!
//! # Responsibilities
//! - Build the one shared registry from configuration
//! - Bind the gated listener
//! - Run the accept loop until shutdown
//!
//! # Design Decisions
//! - Accept errors (EMFILE, ECONNABORTED, ...) back off and retry; only the
//!   shutdown signal ends the loop

use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tokio::sync::broadcast;

use crate::config::LimiterConfig;
use crate::net::{ConnectionGuard, GatedListener, ListenerError};

/// First delay after a failed accept.
pub const ACCEPT_BACKOFF_BASE: Duration = Duration::from_millis(50);

/// Upper bound for the accept retry delay.
pub const ACCEPT_BACKOFF_MAX: Duration = Duration::from_secs(1);

/// Build the registry and bind the listener described by `config`.
pub async fn bind(config: &LimiterConfig) -> Result<GatedListener, ListenerError> {
    let registry = Arc::new(config.build_registry());
    if !registry.policy().contains(&config.listener.identifier) {
        tracing::warn!(
            identifier = %config.listener.identifier,
            "Listener identifier has no limit configured; every connection will be rejected"
        );
    }

    GatedListener::bind(&config.listener, registry).await
}

/// Delay before retrying after `consecutive_failures` failed accepts in a row.
///
/// Doubles from [`ACCEPT_BACKOFF_BASE`] and is capped at [`ACCEPT_BACKOFF_MAX`].
pub fn accept_backoff(consecutive_failures: u32) -> Duration {
    if consecutive_failures == 0 {
        return Duration::ZERO;
    }

    let factor = 2u32.saturating_pow(consecutive_failures - 1);
    ACCEPT_BACKOFF_BASE.saturating_mul(factor).min(ACCEPT_BACKOFF_MAX)
}

/// Accept admitted connections until `shutdown` fires.
///
/// Failed accepts are logged and retried after [`accept_backoff`]; the
/// shutdown signal is still observed while backing off.
pub async fn serve(listener: GatedListener, mut shutdown: broadcast::Receiver<()>) {
    let mut failures = 0u32;
    loop {
        let delay = tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, _peer, guard)) => {
                    failures = 0;
                    tokio::spawn(drain(stream, guard));
                    continue;
                }
                Err(e) => {
                    failures = failures.saturating_add(1);
                    let delay = accept_backoff(failures);
                    tracing::warn!(
                        identifier = %listener.identifier(),
                        error = %e,
                        consecutive_failures = failures,
                        backoff_ms = delay.as_millis() as u64,
                        "Accept failed, retrying"
                    );
                    delay
                }
            },
            _ = shutdown.recv() => break,
        };

        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = shutdown.recv() => break,
        }
    }

    tracing::info!(identifier = %listener.identifier(), "Listener stopped accepting");
}

/// Read and discard until the peer closes; the guard is released afterwards.
async fn drain(mut stream: TcpStream, guard: ConnectionGuard) {
    let mut buf = [0u8; 4096];
    loop {
        match stream.read(&mut buf).await {
            Ok(0) => break,
            Ok(_) => continue,
            Err(e) => {
                tracing::debug!(connection_id = %guard.id(), error = %e, "Connection read failed");
                break;
            }
        }
    }
    drop(guard);
}

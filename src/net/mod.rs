//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept loop, per-identifier admission)
//!     → connection.rs (guard releases the registry slot on drop)
//!     → Hand off to the connection task
//! ```
//!
//! # Design Decisions
//! - The registry is injected as `Arc<dyn ConnLimit>`; no global state
//! - Check and record happen in one `try_establish` call
//! - Denied peers are closed immediately; the accept loop keeps going

pub mod connection;
pub mod listener;

pub use connection::{ConnectionGuard, ConnectionId};
pub use listener::{GatedListener, ListenerError};

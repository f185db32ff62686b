//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load config → Build registry → Bind gated listener → Serve
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Stop accepting → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger shutdown
//! ```
//!
//! # Design Decisions
//! - Exactly one registry per process, created in startup and passed down
//! - Open connections keep their guards until their tasks end

pub mod shutdown;
pub mod signals;
pub mod startup;

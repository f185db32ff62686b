//! Caller pairing violations.
//!
//! These are never returned to callers. The registry panics with their
//! message, since a lost connection that was never established means the
//! surrounding connection handling is broken.

use std::net::IpAddr;

/// A `on_lost` call without a matching `on_established`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PairingViolation {
    #[error("connection lost for unknown identifier, id={id}, ip={ip}")]
    UnknownIdentifier { id: String, ip: IpAddr },

    #[error("connection lost for unrecorded address, id={id}, ip={ip}")]
    UnknownAddress { id: String, ip: IpAddr },

    #[error("connection lost with counter already at zero, id={id}, ip={ip}")]
    ZeroCounter { id: String, ip: IpAddr },
}

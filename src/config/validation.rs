//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Reject empty and duplicate identifiers in `limits`
//! - Check the listener bind address and identifier
//! - Check the log level
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - A listener identifier without a policy entry is allowed (it rejects
//!   every connection); the daemon warns about it at startup

use std::collections::HashSet;
use std::net::SocketAddr;

use crate::config::schema::LimiterConfig;
use crate::observability::logging::LOG_LEVELS;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("limits[{index}]: identifier must not be empty")]
    EmptyIdentifier { index: usize },

    #[error("limits: duplicate identifier '{0}'")]
    DuplicateIdentifier(String),

    #[error("listener.bind_address: invalid socket address '{0}'")]
    InvalidBindAddress(String),

    #[error("listener.identifier must not be empty")]
    EmptyListenerIdentifier,

    #[error("observability.log_level: unknown level '{0}'")]
    UnknownLogLevel(String),
}

pub fn validate_config(config: &LimiterConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let mut seen = HashSet::new();

    for (index, entry) in config.limits.iter().enumerate() {
        if entry.id.is_empty() {
            errors.push(ValidationError::EmptyIdentifier { index });
        } else if !seen.insert(entry.id.as_str()) {
            errors.push(ValidationError::DuplicateIdentifier(entry.id.clone()));
        }
    }

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidBindAddress(
            config.listener.bind_address.clone(),
        ));
    }

    if config.listener.identifier.is_empty() {
        errors.push(ValidationError::EmptyListenerIdentifier);
    }

    if !LOG_LEVELS.contains(&config.observability.log_level.as_str()) {
        errors.push(ValidationError::UnknownLogLevel(
            config.observability.log_level.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

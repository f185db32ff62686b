//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → LimiterConfig (validated, immutable)
//!     → build_registry() → one shared ConnLimitRegistry
//! ```
//!
//! # Design Decisions
//! - The policy is fixed for the process lifetime; there is no reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{LimiterConfig, ListenerConfig, ObservabilityConfig};
pub use validation::{validate_config, ValidationError};

//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML/JSON, by extension)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ProxyConfig (validated, immutable)
//!     → startup builds the roster, checker and strategy from it
//!
//! Missing or invalid file:
//!     → warning logged
//!     → ProxyConfig::default() (three local nodes, round robin)
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, load_or_default, ConfigError};
pub use schema::{
    HealthCheckConfig, LimitsConfig, ListenerConfig, NodeConfig, ObservabilityConfig,
    ProxyConfig, TimeoutConfig,
};
pub use validation::{validate_config, ValidationError};

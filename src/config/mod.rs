//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse, VELOCITY_* env overrides)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!     → TargetPool built once at startup
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; the target pool never resizes
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, load_config_or_default, load_default, ConfigError, ConfigSource};
pub use schema::{
    AdminConfig, Algorithm, GatewayConfig, HealthCheckConfig, LoadBalancingConfig, LogFormat,
    LogLevel, LoggingConfig, MetricsConfig, ServerConfig, TargetConfig, TransportConfig,
};
pub use validation::{validate_config, ValidationError};

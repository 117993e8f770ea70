//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML) + PROXY_* environment
//!     → loader.rs (parse, deserialize, apply overrides)
//!     → validation.rs (semantic checks)
//!     → ProxyConfig (validated, immutable)
//!     → handed by reference to each component's constructor
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; there is no hot reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    AdmissionConfig, AuthenticationConfig, ListenerConfig, LogFormat, ObservabilityConfig,
    ProxyConfig, ShutdownConfig, UpstreamClientConfig,
};
pub use validation::{validate_config, ValidationError};

//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize)
//!     → environment overrides (JWT_SECRET, EDGE_UPSTREAMS, ...)
//!     → validation.rs (semantic checks)
//!     → EdgeConfig (validated, immutable)
//!     → handed to EdgeServer, which builds the services
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; targets and secret never change at runtime
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    AuthConfig, CacheBackend, CacheConfig, ClientIpConfig, DataServiceConfig, EdgeConfig,
    ListenerConfig, LogFormat, ObservabilityConfig, RateLimitConfig, TimeoutConfig,
    UpstreamConfig, WhitelistConfig,
};

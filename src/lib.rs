//! Edge gateway library.

// Core subsystems
pub mod config;
pub mod error;
pub mod http;
pub mod pipeline;

// Traffic management
pub mod cache;
pub mod load_balancer;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;
pub mod security;

pub use config::schema::EdgeConfig;
pub use error::{BuildError, EdgeError};
pub use http::{EdgeServer, EdgeServices};
pub use lifecycle::Shutdown;
pub use pipeline::EdgePipeline;

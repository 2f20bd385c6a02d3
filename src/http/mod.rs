//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, tracing)
//!     → middleware/admission.rs (whitelist, rate limit, auth)
//!     → server.rs handlers
//!         /login  → Authenticator
//!         /data   → data.rs (data service)
//!         *       → proxy.rs (round-robin upstream pool)
//!     → response.rs (error mapping)
//!     → Send to client
//! ```

pub mod data;
pub mod middleware;
pub mod proxy;
pub mod request;
pub mod response;
pub mod server;

pub use data::DataClient;
pub use proxy::{ForwardError, Forwarder, X_GATEWAY_USED};
pub use request::{RequestIdExt, X_REQUEST_ID};
pub use server::{EdgeServer, EdgeServices};

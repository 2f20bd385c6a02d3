//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → client_ip.rs (resolve ClientIdentity, honoring trusted proxies)
//!     → whitelist.rs (is the client on the cached whitelist?)
//!     → rate_limit.rs (per-client token bucket)
//!     → auth.rs (bearer token, protected routes only)
//!     → headers.rs (X-Forwarded-For, hop-by-hop stripping before forwarding)
//! ```
//!
//! # Design Decisions
//! - Fail closed: a check that cannot decide rejects the request
//! - Every service is an owned value injected into the pipeline; no globals

pub mod auth;
pub mod client_ip;
pub mod clock;
pub mod headers;
pub mod rate_limit;
pub mod whitelist;

pub use auth::{AuthError, Authenticator, Claims, CredentialStore, SessionToken, StaticCredentials};
pub use client_ip::{ClientIdentity, ClientIpResolver};
pub use clock::{Clock, ManualClock, SystemClock};
pub use rate_limit::RateLimiter;
pub use whitelist::{
    HttpWhitelistSource, WhitelistCache, WhitelistError, WhitelistRecord, WhitelistSnapshot,
    WhitelistSource,
};

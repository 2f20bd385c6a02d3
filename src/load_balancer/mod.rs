//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Request admitted by the pipeline
//!     → pool.rs (fixed, ordered target list)
//!     → round_robin.rs (counter mod N)
//!     → backend.rs (rewrite path + query onto the target base URL)
//!     → Forwarder streams the request
//! ```
//!
//! # Design Decisions
//! - Targets are immutable after startup; no synchronization needed
//! - No weighting and no health awareness: a down target is still selected
//! - The only shared mutable state is the round-robin counter

pub mod backend;
pub mod pool;
pub mod round_robin;

use std::fmt::Debug;

pub use backend::{TargetError, UpstreamTarget};
pub use pool::UpstreamPool;
pub use round_robin::RoundRobin;

/// Strategy for choosing a target.
pub trait LoadBalancer: Send + Sync + Debug {
    fn next_target<'a>(&self, targets: &'a [UpstreamTarget]) -> Option<&'a UpstreamTarget>;
}

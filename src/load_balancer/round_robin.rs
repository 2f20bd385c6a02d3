//! Round-robin load balancing strategy.

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::load_balancer::{backend::UpstreamTarget, LoadBalancer};

/// Round-robin selector.
/// Stores an internal counter to rotate through targets.
#[derive(Debug, Default)]
pub struct RoundRobin {
    counter: AtomicUsize,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LoadBalancer for RoundRobin {
    fn next_target<'a>(&self, targets: &'a [UpstreamTarget]) -> Option<&'a UpstreamTarget> {
        if targets.is_empty() {
            return None;
        }

        // fetch_add hands every caller a distinct pre-increment value.
        let index = self.counter.fetch_add(1, Ordering::Relaxed) % targets.len();
        targets.get(index)
    }
}

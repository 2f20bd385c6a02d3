//! Upstream pool management.
//!
//! # Responsibilities
//! - Hold the immutable, ordered target list
//! - Apply the load balancing algorithm to select a target

use crate::config::UpstreamConfig;
use crate::load_balancer::{
    backend::{TargetError, UpstreamTarget},
    round_robin::RoundRobin,
    LoadBalancer,
};

/// The configured targets plus the strategy that picks among them.
#[derive(Debug)]
pub struct UpstreamPool {
    targets: Vec<UpstreamTarget>,
    balancer: Box<dyn LoadBalancer>,
}

impl UpstreamPool {
    pub fn new(targets: Vec<UpstreamTarget>, balancer: Box<dyn LoadBalancer>) -> Self {
        Self { targets, balancer }
    }

    /// Round-robin pool from configuration.
    pub fn from_config(config: &UpstreamConfig) -> Result<Self, TargetError> {
        let targets = config
            .targets
            .iter()
            .map(|raw| UpstreamTarget::parse(raw))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(targets, Box::new(RoundRobin::new())))
    }

    /// Pick the target for the next request.
    pub fn select(&self) -> Option<&UpstreamTarget> {
        self.balancer.next_target(&self.targets)
    }
}

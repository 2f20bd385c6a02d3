//! The ordered admission pipeline.
//!
//! # Data Flow
//! ```text
//! Received
//!     → Whitelist   (403 on miss, 500 if the source is down)
//!     → RateLimit   (429)
//!     → Auth        (401, protected routes only)
//!     → Forward     (upstream pool or data service)
//! ```
//!
//! # Design Decisions
//! - Stages run strictly in order and the first failure short-circuits
//! - A rejected request never consumes budget at a later stage; a request
//!   that fails auth has already spent a rate-limit token
//! - Each stage owns its state; requests only meet through those services

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Body,
    http::{header::AUTHORIZATION, HeaderMap, Request},
};

use crate::cache::build_store;
use crate::config::EdgeConfig;
use crate::error::{BuildError, EdgeError};
use crate::http::proxy::{Forwarded, Forwarder};
use crate::security::{
    Authenticator, Claims, ClientIdentity, ClientIpResolver, HttpWhitelistSource, RateLimiter,
    WhitelistCache,
};

/// A step of the pipeline; used to label rejections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Whitelist,
    RateLimit,
    Auth,
    Forward,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Whitelist => "whitelist",
            Stage::RateLimit => "rate_limit",
            Stage::Auth => "auth",
            Stage::Forward => "forward",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a route requires a session token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protection {
    Public,
    Bearer,
}

/// A request that passed every admission stage.
#[derive(Debug, Clone)]
pub struct Admission {
    pub client: ClientIdentity,
    pub claims: Option<Claims>,
}

/// Owns every per-request service and runs them in order.
pub struct EdgePipeline {
    resolver: ClientIpResolver,
    whitelist: WhitelistCache,
    limiter: RateLimiter,
    authenticator: Authenticator,
    forwarder: Forwarder,
}

impl EdgePipeline {
    pub fn new(
        resolver: ClientIpResolver,
        whitelist: WhitelistCache,
        limiter: RateLimiter,
        authenticator: Authenticator,
        forwarder: Forwarder,
    ) -> Self {
        Self {
            resolver,
            whitelist,
            limiter,
            authenticator,
            forwarder,
        }
    }

    /// Build every service from configuration.
    pub fn from_config(config: &EdgeConfig) -> Result<Self, BuildError> {
        let store = build_store(&config.cache)?;
        let source = HttpWhitelistSource::from_config(&config.whitelist, &config.timeouts)?;
        Ok(Self::new(
            ClientIpResolver::from_config(&config.client_ip),
            WhitelistCache::from_config(&config.whitelist, store, Arc::new(source)),
            RateLimiter::from_config(&config.rate_limit),
            Authenticator::from_config(&config.auth),
            Forwarder::from_config(&config.upstreams, &config.timeouts)?,
        ))
    }

    pub fn with_whitelist(mut self, whitelist: WhitelistCache) -> Self {
        self.whitelist = whitelist;
        self
    }

    pub fn with_authenticator(mut self, authenticator: Authenticator) -> Self {
        self.authenticator = authenticator;
        self
    }

    pub fn with_rate_limiter(mut self, limiter: RateLimiter) -> Self {
        self.limiter = limiter;
        self
    }

    pub fn authenticator(&self) -> &Authenticator {
        &self.authenticator
    }

    pub fn resolve_client(&self, peer: SocketAddr, headers: &HeaderMap) -> ClientIdentity {
        self.resolver.resolve(peer, headers)
    }

    /// Run the whitelist, rate-limit and (for protected routes) auth stages.
    pub async fn admit(
        &self,
        client: ClientIdentity,
        headers: &HeaderMap,
        protection: Protection,
    ) -> Result<Admission, EdgeError> {
        if !self.whitelist.is_admitted(&client).await? {
            return Err(EdgeError::NotWhitelisted { client });
        }
        tracing::trace!(client = %client, stage = %Stage::Whitelist, "Stage passed");

        if !self.limiter.allow(&client) {
            return Err(EdgeError::RateLimited);
        }
        tracing::trace!(client = %client, stage = %Stage::RateLimit, "Stage passed");

        let claims = match protection {
            Protection::Public => None,
            Protection::Bearer => {
                let raw = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok());
                let claims = self.authenticator.verify(raw)?;
                tracing::trace!(client = %client, subject = %claims.sub, stage = %Stage::Auth, "Stage passed");
                Some(claims)
            }
        };

        Ok(Admission { client, claims })
    }

    /// Forward an admitted request to the upstream pool.
    pub async fn forward(&self, request: Request<Body>, admission: &Admission) -> Result<Forwarded, EdgeError> {
        Ok(self.forwarder.forward(request, &admission.client).await?)
    }
}

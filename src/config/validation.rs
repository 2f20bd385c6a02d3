//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (rates > 0, TTLs > 0)
//! - Check that every URL and proxy address parses
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: EdgeConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::IpAddr;
use thiserror::Error;
use url::Url;

use crate::config::schema::{CacheBackend, EdgeConfig};
use crate::load_balancer::UpstreamTarget;

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Validate a fully loaded configuration.
pub fn validate_config(config: &EdgeConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<std::net::SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("invalid socket address '{}'", config.listener.bind_address),
        ));
    }

    if config.upstreams.targets.is_empty() {
        errors.push(ValidationError::new(
            "upstreams.targets",
            "at least one upstream target is required",
        ));
    }
    for target in &config.upstreams.targets {
        if let Err(e) = UpstreamTarget::parse(target) {
            errors.push(ValidationError::new("upstreams.targets", e.to_string()));
        }
    }

    check_http_url(&mut errors, "whitelist.source_url", &config.whitelist.source_url);
    check_http_url(&mut errors, "data_service.url", &config.data_service.url);

    if config.whitelist.cache_key.is_empty() {
        errors.push(ValidationError::new("whitelist.cache_key", "must not be empty"));
    }
    if config.whitelist.ttl_secs == 0 {
        errors.push(ValidationError::new("whitelist.ttl_secs", "must be greater than 0"));
    }

    if config.cache.backend == CacheBackend::Redis && config.cache.redis_url.is_none() {
        errors.push(ValidationError::new(
            "cache.redis_url",
            "required when cache.backend = \"redis\"",
        ));
    }

    let rps = config.rate_limit.requests_per_second;
    if rps.is_nan() || rps <= 0.0 {
        errors.push(ValidationError::new(
            "rate_limit.requests_per_second",
            "must be greater than 0",
        ));
    }
    if config.rate_limit.burst_size == 0 {
        errors.push(ValidationError::new("rate_limit.burst_size", "must be greater than 0"));
    }

    if config.auth.secret.is_empty() {
        errors.push(ValidationError::new(
            "auth.secret",
            "a signing secret is required (set JWT_SECRET)",
        ));
    }
    if config.auth.token_ttl_secs == 0 {
        errors.push(ValidationError::new("auth.token_ttl_secs", "must be greater than 0"));
    }
    if config.auth.username.is_empty() || config.auth.password.is_empty() {
        errors.push(ValidationError::new(
            "auth.username",
            "credential pair must not be empty",
        ));
    }

    for proxy in &config.client_ip.trusted_proxies {
        if proxy.parse::<IpAddr>().is_err() {
            errors.push(ValidationError::new(
                "client_ip.trusted_proxies",
                format!("'{}' is not an IP address", proxy),
            ));
        }
    }

    if config.timeouts.upstream_secs == 0 || config.timeouts.service_secs == 0 {
        errors.push(ValidationError::new("timeouts", "timeouts must be greater than 0"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_http_url(errors: &mut Vec<ValidationError>, field: &'static str, raw: &str) {
    match Url::parse(raw) {
        Ok(url) if matches!(url.scheme(), "http" | "https") && url.has_host() => {}
        Ok(_) => errors.push(ValidationError::new(
            field,
            format!("'{}' must be an http(s) URL with a host", raw),
        )),
        Err(e) => errors.push(ValidationError::new(field, format!("'{}': {}", raw, e))),
    }
}

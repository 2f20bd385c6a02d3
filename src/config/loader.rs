//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::config::schema::{CacheBackend, EdgeConfig};
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {var}: '{value}'")]
    Env { var: &'static str, value: String },

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load configuration from an optional TOML file, apply environment
/// overrides and validate the result.
pub fn load_config(path: Option<&Path>) -> Result<EdgeConfig, ConfigError> {
    let mut config = match path {
        Some(path) => {
            let content = fs::read_to_string(path)?;
            toml::from_str(&content)?
        }
        None => EdgeConfig::default(),
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Overlay environment variables onto a configuration.
///
/// `lookup` is injected so callers (and tests) control where values come from.
pub fn apply_env_overrides<F>(config: &mut EdgeConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(secret) = lookup("JWT_SECRET") {
        config.auth.secret = secret;
    }
    if let Some(addr) = lookup("EDGE_BIND_ADDRESS") {
        config.listener.bind_address = addr;
    }
    if let Some(list) = lookup("EDGE_UPSTREAMS") {
        config.upstreams.targets = list
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();
    }
    if let Some(url) = lookup("WHITELIST_URL") {
        config.whitelist.source_url = url;
    }
    if let Some(url) = lookup("DATA_SERVICE_URL") {
        config.data_service.url = url;
    }
    if let Some(url) = lookup("REDIS_URL") {
        config.cache.backend = CacheBackend::Redis;
        config.cache.redis_url = Some(url);
    }
    if let Some(raw) = lookup("RATE_LIMIT_RPS") {
        config.rate_limit.requests_per_second = raw.parse().map_err(|_| ConfigError::Env {
            var: "RATE_LIMIT_RPS",
            value: raw.clone(),
        })?;
    }
    if let Some(raw) = lookup("RATE_LIMIT_BURST") {
        config.rate_limit.burst_size = raw.parse().map_err(|_| ConfigError::Env {
            var: "RATE_LIMIT_BURST",
            value: raw.clone(),
        })?;
    }
    Ok(())
}

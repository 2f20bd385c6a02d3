//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the edge.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the edge gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct EdgeConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Upstream targets for the catch-all proxy.
    pub upstreams: UpstreamConfig,

    /// IP whitelist source and cache policy.
    pub whitelist: WhitelistConfig,

    /// Shared cache store backing the whitelist.
    pub cache: CacheConfig,

    /// Per-client rate limiting.
    pub rate_limit: RateLimitConfig,

    /// Session token issuing and verification.
    pub auth: AuthConfig,

    /// Data service behind the protected endpoint.
    pub data_service: DataServiceConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Client address resolution.
    pub client_ip: ClientIpConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Upstream target list.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Ordered base URLs (e.g., "http://gateway_1:8080").
    pub targets: Vec<String>,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            targets: vec![
                "http://gateway_1:8080".to_string(),
                "http://gateway_2:8080".to_string(),
            ],
        }
    }
}

/// Whitelist source and caching policy.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WhitelistConfig {
    /// URL returning `[{"ip": "..."}]`.
    pub source_url: String,

    /// Cache key the snapshot is stored under.
    pub cache_key: String,

    /// Snapshot lifetime in seconds.
    pub ttl_secs: u64,

    /// Collapse concurrent refills inside this process.
    pub single_flight: bool,
}

impl Default for WhitelistConfig {
    fn default() -> Self {
        Self {
            source_url: "http://whitelist:8082/whitelist".to_string(),
            cache_key: "ValidIPs".to_string(),
            ttl_secs: 60,
            single_flight: true,
        }
    }
}

/// Which cache store implementation to use.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    Memory,
    Redis,
}

/// Cache store configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    pub backend: CacheBackend,

    /// Redis connection URL, required for the redis backend.
    pub redis_url: Option<String>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackend::Memory,
            redis_url: None,
        }
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Tokens refilled per second per client.
    pub requests_per_second: f64,

    /// Burst capacity.
    pub burst_size: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_second: 5.0,
            burst_size: 8,
        }
    }
}

/// Authentication configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// HMAC signing secret. Must be supplied (file or `JWT_SECRET`).
    pub secret: String,

    /// Token lifetime in seconds.
    pub token_ttl_secs: u64,

    /// The single accepted credential pair.
    pub username: String,
    pub password: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            secret: String::new(),
            token_ttl_secs: 2 * 60 * 60,
            // WARNING: placeholder credentials. Override in production.
            username: "user1".to_string(),
            password: "password123".to_string(),
        }
    }
}

/// Data service configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DataServiceConfig {
    pub url: String,
}

impl Default for DataServiceConfig {
    fn default() -> Self {
        Self {
            url: "http://microservice:8081/microservice".to_string(),
        }
    }
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Time allowed for an upstream to return response headers, in seconds.
    pub upstream_secs: u64,

    /// Time allowed for whitelist source and data service calls, in seconds.
    pub service_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5,
            upstream_secs: 30,
            service_secs: 10,
        }
    }
}

/// Client address resolution.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ClientIpConfig {
    /// Peers whose `X-Forwarded-For` is trusted.
    pub trusted_proxies: Vec<String>,
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

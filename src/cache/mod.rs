//! Shared key/value cache subsystem.
//!
//! # Data Flow
//! ```text
//! WhitelistCache
//!     → CacheStore::get(key)      (Ok(None) = miss, Err = store failure)
//!     → CacheStore::set(key, json, ttl)
//!         - memory.rs (single node, default)
//!         - redis.rs  (shared across replicas, feature "redis-storage")
//! ```
//!
//! # Design Decisions
//! - Values are JSON text; callers own (de)serialization
//! - A miss is never reported as an error
//! - Expiry is the store's job, callers only pass a TTL

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::{CacheBackend, CacheConfig};

pub mod memory;
#[cfg(feature = "redis-storage")]
pub mod redis;

pub use memory::InMemoryStore;

/// Error type for cache store operations.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache backend error: {0}")]
    Backend(String),

    #[error("cache value is not valid JSON: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("cache backend '{0}' is not available in this build")]
    Unsupported(&'static str),
}

/// Key/value store with per-entry TTL.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Fetch a live value. Expired entries read as `None`.
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Store a value that expires after `ttl`.
    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError>;
}

/// Build the configured cache store.
pub fn build_store(config: &CacheConfig) -> Result<Arc<dyn CacheStore>, CacheError> {
    match config.backend {
        CacheBackend::Memory => Ok(Arc::new(InMemoryStore::new())),
        CacheBackend::Redis => redis_store(config),
    }
}

#[cfg(feature = "redis-storage")]
fn redis_store(config: &CacheConfig) -> Result<Arc<dyn CacheStore>, CacheError> {
    let url = config
        .redis_url
        .as_deref()
        .ok_or_else(|| CacheError::Backend("redis_url is not set".to_string()))?;
    Ok(Arc::new(redis::RedisStore::new(url)?))
}

#[cfg(not(feature = "redis-storage"))]
fn redis_store(_config: &CacheConfig) -> Result<Arc<dyn CacheStore>, CacheError> {
    Err(CacheError::Unsupported("redis"))
}

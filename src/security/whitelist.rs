//! IP whitelisting backed by a read-through, TTL-expiring cache.
//!
//! # Data Flow
//! ```text
//! is_admitted(client)
//!     → CacheStore::get(cache_key)
//!         hit  → membership test
//!         miss → [single-flight lock, re-check]
//!              → WhitelistSource::fetch()
//!              → CacheStore::set(cache_key, snapshot, ttl)
//!              → membership test
//! ```
//!
//! # Design Decisions
//! - A failed fetch is an error for the request; admission never defaults to allowed
//! - An empty list is a valid snapshot that admits nobody
//! - Malformed entries fail the whole fetch instead of being skipped
//! - Racing misses in other replicas may each fetch; inside one process the
//!   optional single-flight lock collapses them into one fetch

use std::collections::HashSet;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;

use crate::cache::{CacheError, CacheStore};
use crate::config::{TimeoutConfig, WhitelistConfig};
use crate::observability::metrics;
use crate::security::client_ip::ClientIdentity;
use crate::security::clock::{Clock, SystemClock};

#[derive(Debug, Error)]
pub enum WhitelistError {
    #[error("error calling whitelist source: {0}")]
    Source(String),

    #[error("malformed whitelist entry: '{0}'")]
    MalformedEntry(String),

    #[error(transparent)]
    Cache(#[from] CacheError),
}

/// One record as served by the whitelist source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhitelistRecord {
    pub ip: String,
}

/// The authoritative list of admitted addresses.
#[async_trait]
pub trait WhitelistSource: Send + Sync {
    async fn fetch(&self) -> Result<Vec<WhitelistRecord>, WhitelistError>;
}

/// Fetches `[{"ip": "..."}]` over HTTP.
#[derive(Debug, Clone)]
pub struct HttpWhitelistSource {
    client: reqwest::Client,
    url: String,
}

impl HttpWhitelistSource {
    pub fn new(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }

    pub fn from_config(config: &WhitelistConfig, timeouts: &TimeoutConfig) -> Result<Self, WhitelistError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(timeouts.connect_secs))
            .timeout(Duration::from_secs(timeouts.service_secs))
            .build()
            .map_err(|e| WhitelistError::Source(e.to_string()))?;
        Ok(Self::new(client, config.source_url.clone()))
    }
}

#[async_trait]
impl WhitelistSource for HttpWhitelistSource {
    async fn fetch(&self) -> Result<Vec<WhitelistRecord>, WhitelistError> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| WhitelistError::Source(e.to_string()))?;

        response
            .json::<Vec<WhitelistRecord>>()
            .await
            .map_err(|e| WhitelistError::Source(format!("error decoding JSON: {}", e)))
    }
}

/// Cached set of admitted IPs plus when it was fetched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WhitelistSnapshot {
    pub ips: HashSet<String>,
    /// Unix seconds.
    pub fetched_at: u64,
}

impl WhitelistSnapshot {
    /// Normalize source records. Any unparseable entry rejects the batch.
    pub fn from_records(records: Vec<WhitelistRecord>, fetched_at: u64) -> Result<Self, WhitelistError> {
        let ips = records
            .into_iter()
            .map(|record| {
                record
                    .ip
                    .trim()
                    .parse::<IpAddr>()
                    .map(|ip| ip.to_canonical().to_string())
                    .map_err(|_| WhitelistError::MalformedEntry(record.ip))
            })
            .collect::<Result<HashSet<_>, _>>()?;
        Ok(Self { ips, fetched_at })
    }

    pub fn contains(&self, client: &ClientIdentity) -> bool {
        self.ips.contains(&client.to_string())
    }
}

/// Read-through whitelist over a [`CacheStore`].
pub struct WhitelistCache {
    store: Arc<dyn CacheStore>,
    source: Arc<dyn WhitelistSource>,
    cache_key: String,
    ttl: Duration,
    refill_lock: Option<Mutex<()>>,
    clock: Arc<dyn Clock>,
}

impl WhitelistCache {
    pub fn new(
        store: Arc<dyn CacheStore>,
        source: Arc<dyn WhitelistSource>,
        cache_key: impl Into<String>,
        ttl: Duration,
    ) -> Self {
        Self {
            store,
            source,
            cache_key: cache_key.into(),
            ttl,
            refill_lock: Some(Mutex::new(())),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn from_config(
        config: &WhitelistConfig,
        store: Arc<dyn CacheStore>,
        source: Arc<dyn WhitelistSource>,
    ) -> Self {
        Self::new(store, source, config.cache_key.clone(), Duration::from_secs(config.ttl_secs))
            .with_single_flight(config.single_flight)
    }

    /// Toggle the in-process refill lock.
    pub fn with_single_flight(mut self, enabled: bool) -> Self {
        self.refill_lock = enabled.then(|| Mutex::new(()));
        self
    }

    /// Stamp snapshots with `clock` instead of the system clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Is `client` on the current whitelist?
    pub async fn is_admitted(&self, client: &ClientIdentity) -> Result<bool, WhitelistError> {
        let snapshot = self.snapshot().await?;
        Ok(snapshot.contains(client))
    }

    /// The live snapshot, fetching it if the cache has none.
    pub async fn snapshot(&self) -> Result<WhitelistSnapshot, WhitelistError> {
        if let Some(snapshot) = self.cached().await? {
            return Ok(snapshot);
        }

        let Some(lock) = &self.refill_lock else {
            return self.refill().await;
        };

        let _guard = lock.lock().await;
        // Another task may have refilled while we waited.
        if let Some(snapshot) = self.cached().await? {
            return Ok(snapshot);
        }
        self.refill().await
    }

    async fn cached(&self) -> Result<Option<WhitelistSnapshot>, WhitelistError> {
        match self.store.get(&self.cache_key).await? {
            Some(raw) => {
                let snapshot: WhitelistSnapshot =
                    serde_json::from_str(&raw).map_err(CacheError::from)?;
                tracing::trace!(
                    entries = snapshot.ips.len(),
                    age_secs = self.clock.now_unix().saturating_sub(snapshot.fetched_at),
                    "Whitelist cache hit"
                );
                Ok(Some(snapshot))
            }
            None => Ok(None),
        }
    }

    async fn refill(&self) -> Result<WhitelistSnapshot, WhitelistError> {
        let records = match self.source.fetch().await {
            Ok(records) => records,
            Err(e) => {
                tracing::error!(error = %e, "Whitelist fetch failed");
                metrics::record_whitelist_fetch("error");
                return Err(e);
            }
        };

        let snapshot = WhitelistSnapshot::from_records(records, self.clock.now_unix()).inspect_err(|e| {
            tracing::error!(error = %e, "Whitelist source returned a malformed entry");
            metrics::record_whitelist_fetch("malformed");
        })?;

        let raw = serde_json::to_string(&snapshot).map_err(CacheError::from)?;
        self.store.set(&self.cache_key, raw, self.ttl).await?;

        metrics::record_whitelist_fetch("ok");
        tracing::info!(
            entries = snapshot.ips.len(),
            ttl_secs = self.ttl.as_secs(),
            "Whitelist refreshed"
        );
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::InMemoryStore;
    use crate::security::clock::ManualClock;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Serves a fixed record list and counts calls.
    struct CountingSource {
        records: Vec<&'static str>,
        calls: AtomicUsize,
        delay: Duration,
    }

    impl CountingSource {
        fn new(records: Vec<&'static str>) -> Arc<Self> {
            Arc::new(Self {
                records,
                calls: AtomicUsize::new(0),
                delay: Duration::ZERO,
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl WhitelistSource for CountingSource {
        async fn fetch(&self) -> Result<Vec<WhitelistRecord>, WhitelistError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            Ok(self
                .records
                .iter()
                .map(|ip| WhitelistRecord { ip: ip.to_string() })
                .collect())
        }
    }

    struct FailingSource;

    #[async_trait]
    impl WhitelistSource for FailingSource {
        async fn fetch(&self) -> Result<Vec<WhitelistRecord>, WhitelistError> {
            Err(WhitelistError::Source("connection refused".into()))
        }
    }

    fn client(ip: &str) -> ClientIdentity {
        ClientIdentity::new(ip.parse().unwrap())
    }

    fn cache(source: Arc<dyn WhitelistSource>) -> WhitelistCache {
        WhitelistCache::new(
            Arc::new(InMemoryStore::new()),
            source,
            "ValidIPs",
            Duration::from_secs(60),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_membership_matches_last_fetch() {
        let source = CountingSource::new(vec!["10.0.0.1", "192.168.1.20", "::1"]);
        let wl = cache(source.clone());

        assert!(wl.is_admitted(&client("10.0.0.1")).await.unwrap());
        assert!(wl.is_admitted(&client("192.168.1.20")).await.unwrap());
        assert!(wl.is_admitted(&client("::1")).await.unwrap());
        assert!(!wl.is_admitted(&client("10.0.0.2")).await.unwrap());
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exactly_one_refetch_after_ttl() {
        let source = CountingSource::new(vec!["10.0.0.1"]);
        let wl = cache(source.clone());

        wl.is_admitted(&client("10.0.0.1")).await.unwrap();
        tokio::time::advance(Duration::from_secs(59)).await;
        wl.is_admitted(&client("10.0.0.1")).await.unwrap();
        assert_eq!(source.calls(), 1);

        tokio::time::advance(Duration::from_millis(1001)).await;
        assert!(wl.is_admitted(&client("10.0.0.1")).await.unwrap());
        assert_eq!(source.calls(), 2);

        wl.is_admitted(&client("10.0.0.1")).await.unwrap();
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_list_admits_nobody() {
        let source = CountingSource::new(vec![]);
        let wl = cache(source.clone());

        assert!(!wl.is_admitted(&client("127.0.0.1")).await.unwrap());
        assert!(!wl.is_admitted(&client("127.0.0.1")).await.unwrap());
        // The empty snapshot is cached like any other.
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn test_malformed_entry_is_an_error() {
        let source = CountingSource::new(vec!["10.0.0.1", "not-an-ip"]);
        let wl = cache(source);

        let err = wl.is_admitted(&client("10.0.0.1")).await.unwrap_err();
        assert!(matches!(err, WhitelistError::MalformedEntry(ref e) if e == "not-an-ip"));
    }

    #[tokio::test]
    async fn test_source_failure_never_admits() {
        let wl = cache(Arc::new(FailingSource));
        assert!(matches!(
            wl.is_admitted(&client("10.0.0.1")).await,
            Err(WhitelistError::Source(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_flight_collapses_concurrent_misses() {
        let source = Arc::new(CountingSource {
            records: vec!["10.0.0.1"],
            calls: AtomicUsize::new(0),
            delay: Duration::from_millis(50),
        });
        let wl = Arc::new(cache(source.clone()));

        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let wl = wl.clone();
                tokio::spawn(async move { wl.is_admitted(&client("10.0.0.1")).await.unwrap() })
            })
            .collect();
        for task in tasks {
            assert!(task.await.unwrap());
        }

        assert_eq!(source.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_without_single_flight_racers_each_fetch() {
        let source = Arc::new(CountingSource {
            records: vec!["10.0.0.1"],
            calls: AtomicUsize::new(0),
            delay: Duration::from_millis(50),
        });
        let wl = Arc::new(cache(source.clone()).with_single_flight(false));

        let tasks: Vec<_> = (0..4)
            .map(|_| {
                let wl = wl.clone();
                tokio::spawn(async move { wl.is_admitted(&client("10.0.0.1")).await.unwrap() })
            })
            .collect();
        for task in tasks {
            assert!(task.await.unwrap());
        }
        assert_eq!(source.calls(), 4);

        // Once populated, later callers hit the cache.
        wl.is_admitted(&client("10.0.0.1")).await.unwrap();
        assert_eq!(source.calls(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_snapshot_stamped_by_injected_clock() {
        let clock = Arc::new(ManualClock::at(1_700_000_000));
        let wl = cache(CountingSource::new(vec!["10.0.0.1"])).with_clock(clock.clone());

        assert_eq!(wl.snapshot().await.unwrap().fetched_at, 1_700_000_000);

        // A cache hit keeps the original stamp.
        clock.advance(Duration::from_secs(30));
        assert_eq!(wl.snapshot().await.unwrap().fetched_at, 1_700_000_000);

        tokio::time::advance(Duration::from_secs(61)).await;
        clock.advance(Duration::from_secs(31));
        assert_eq!(wl.snapshot().await.unwrap().fetched_at, 1_700_000_061);
    }
}

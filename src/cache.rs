//! Two-tier price cache
//!
//! Live quotes are written to a hot tier under `price:{item}` with a TTL, and to
//! a last-known-good tier under `price:last:{item}` that never expires. Normal
//! lookups only see the hot tier; the last-good tier backs the stale fallback.
//!
//! Backend failures never escape this module: reads degrade to a miss and writes
//! report `false`.

use crate::{
    constants::{CACHE_KEY_PREFIX, LAST_GOOD_KEY_PREFIX},
    error::CacheError,
    types::{PriceQuote, QuoteSource},
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

/// Key/value storage with optional per-entry expiry
///
/// Implementations must be safe for concurrent use.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Returns the value stored under `key`, or `None` if missing or expired
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Stores `value` under `key`, replacing any previous entry
    ///
    /// `ttl = None` stores the entry without expiry.
    async fn set(&self, key: &str, value: String, ttl: Option<Duration>)
        -> Result<(), CacheError>;

    /// Returns the name of this backend
    fn backend_name(&self) -> &'static str;
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: String,
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now > at)
    }
}

/// In-process cache backend
#[derive(Clone, Default)]
pub struct InMemoryCache {
    entries: Arc<RwLock<HashMap<String, CacheEntry>>>,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops every expired entry, returning how many were removed
    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        before - entries.len()
    }

    /// Number of stored entries, expired ones included
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl CacheBackend for InMemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let now = Instant::now();
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                None => return Ok(None),
                Some(entry) if !entry.is_expired(now) => return Ok(Some(entry.value.clone())),
                Some(_) => {}
            }
        }

        // Expired: evict unless a writer refreshed it in the meantime
        let mut entries = self.entries.write().await;
        if entries.get(key).is_some_and(|e| e.is_expired(now)) {
            entries.remove(key);
        }
        Ok(None)
    }

    async fn set(
        &self,
        key: &str,
        value: String,
        ttl: Option<Duration>,
    ) -> Result<(), CacheError> {
        let expires_at = ttl.map(|ttl| Instant::now() + ttl);
        self.entries
            .write()
            .await
            .insert(key.to_string(), CacheEntry { value, expires_at });
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

/// Hot cache key for an item
pub fn cache_key(market_hash_name: &str) -> String {
    format!("{}{}", CACHE_KEY_PREFIX, market_hash_name)
}

/// Last-known-good key for an item
pub fn last_good_key(market_hash_name: &str) -> String {
    format!("{}{}", LAST_GOOD_KEY_PREFIX, market_hash_name)
}

/// Price cache used by the fetch pipeline
pub struct PriceCache {
    backend: Arc<dyn CacheBackend>,
    ttl: Duration,
}

impl PriceCache {
    /// Creates a price cache over `backend` with a uniform hot-tier TTL
    pub fn new(backend: Arc<dyn CacheBackend>, ttl: Duration) -> Self {
        Self { backend, ttl }
    }

    /// Creates a price cache backed by a fresh [`InMemoryCache`]
    pub fn in_memory(ttl: Duration) -> Self {
        Self::new(Arc::new(InMemoryCache::new()), ttl)
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.backend_name()
    }

    /// Looks up the hot tier
    ///
    /// # Returns
    /// The cached quote tagged `cache`, or `None` on miss, expiry or backend failure
    pub async fn get(&self, market_hash_name: &str) -> Option<PriceQuote> {
        self.read(&cache_key(market_hash_name))
            .await
            .map(|quote| quote.with_source(QuoteSource::Cache))
    }

    /// Writes a live quote to both tiers
    ///
    /// # Returns
    /// `true` if the hot tier accepted the write
    pub async fn set(&self, market_hash_name: &str, quote: &PriceQuote) -> bool {
        let payload = match serde_json::to_string(quote) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!(
                    item = market_hash_name,
                    error = %CacheError::from(e),
                    "Failed to encode price for cache"
                );
                return false;
            }
        };

        let hot = self
            .write(&cache_key(market_hash_name), payload.clone(), Some(self.ttl))
            .await;
        self.write(&last_good_key(market_hash_name), payload, None)
            .await;
        hot
    }

    /// Best-effort read for the stale fallback
    ///
    /// Tries the hot tier first (a concurrent writer may have filled it since
    /// the miss), then the last-known-good tier.
    pub async fn get_stale(&self, market_hash_name: &str) -> Option<PriceQuote> {
        let quote = match self.read(&cache_key(market_hash_name)).await {
            Some(quote) => Some(quote),
            None => self.read(&last_good_key(market_hash_name)).await,
        };
        quote.map(|q| q.with_source(QuoteSource::StaleCache))
    }

    async fn read(&self, key: &str) -> Option<PriceQuote> {
        let raw = match self.backend.get(key).await {
            Ok(raw) => raw?,
            Err(e) => {
                tracing::error!(key, error = %e, "Cache read failed");
                return None;
            }
        };

        match serde_json::from_str::<PriceQuote>(&raw) {
            Ok(quote) => Some(quote),
            Err(e) => {
                tracing::warn!(key, error = %CacheError::from(e), "Discarding undecodable cache entry");
                None
            }
        }
    }

    async fn write(&self, key: &str, payload: String, ttl: Option<Duration>) -> bool {
        match self.backend.set(key, payload, ttl).await {
            Ok(()) => {
                tracing::debug!(key, ttl_secs = ttl.map(|t| t.as_secs()), "Cached price");
                true
            }
            Err(e) => {
                tracing::error!(key, error = %e, "Failed to cache price");
                false
            }
        }
    }
}

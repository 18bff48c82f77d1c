//! Response cache for gateway completions.
//!
//! Identical requests (same messages, model and temperature rounded to two
//! decimals) share one cache entry. The cache is an optimisation only: any
//! backend failure is logged and treated as a miss so it can never fail a
//! gateway call.
//!
//! # Usage
//!
//! ```ignore
//! use vyvchai::llm::{InMemoryCacheBackend, ResponseCache};
//!
//! let cache = ResponseCache::new(Arc::new(InMemoryCacheBackend::new()), Duration::from_secs(3600));
//! let key = ResponseCache::cache_key(&messages, "lapa", 0.7);
//! if let Some(hit) = cache.get(&key).await { /* ... */ }
//! ```

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::RwLock;

use super::types::Message;

/// Prefix shared by every response-cache key.
pub const CACHE_KEY_PREFIX: &str = "llm_cache:";

/// Number of hex characters of the digest kept in a key.
const KEY_HASH_LEN: usize = 16;

/// Errors raised by cache backends.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Cache connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Cache operation failed: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Cache serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Key-value store holding serialized completions.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError>;

    /// Delete every key starting with `prefix`, returning how many were removed.
    async fn delete_prefix(&self, prefix: &str) -> Result<usize, CacheError>;
}

/// Redis-backed cache using a reconnecting connection manager.
#[derive(Clone)]
pub struct RedisCacheBackend {
    redis: ConnectionManager,
}

impl RedisCacheBackend {
    /// Connect to Redis at `redis_url` (e.g. `redis://localhost:6379`).
    pub async fn connect(redis_url: &str) -> Result<Self, CacheError> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| CacheError::ConnectionFailed(e.to_string()))?;
        let redis = ConnectionManager::new(client)
            .await
            .map_err(|e| CacheError::ConnectionFailed(e.to_string()))?;
        Ok(Self { redis })
    }

    pub fn from_connection(redis: ConnectionManager) -> Self {
        Self { redis }
    }
}

#[async_trait]
impl CacheBackend for RedisCacheBackend {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.redis.clone();
        let value: Option<String> = redis::cmd("GET").arg(key).query_async(&mut conn).await?;
        Ok(value)
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.redis.clone();
        redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("EX")
            .arg(ttl.as_secs().max(1))
            .query_async::<_, ()>(&mut conn)
            .await?;
        Ok(())
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<usize, CacheError> {
        let mut conn = self.redis.clone();
        let pattern = format!("{}*", prefix);
        let mut cursor: u64 = 0;
        let mut deleted = 0;

        loop {
            let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(100)
                .query_async(&mut conn)
                .await?;

            if !keys.is_empty() {
                let removed: usize = redis::cmd("DEL").arg(&keys).query_async(&mut conn).await?;
                deleted += removed;
            }

            if next == 0 {
                break;
            }
            cursor = next;
        }

        Ok(deleted)
    }
}

impl std::fmt::Debug for RedisCacheBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisCacheBackend").finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
struct MemoryEntry {
    value: String,
    expires_at: Instant,
}

/// Process-local cache with per-entry expiry.
#[derive(Debug, Default)]
pub struct InMemoryCacheBackend {
    entries: RwLock<HashMap<String, MemoryEntry>>,
}

impl InMemoryCacheBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .read()
            .await
            .values()
            .filter(|e| e.expires_at > now)
            .count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl CacheBackend for InMemoryCacheBackend {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let now = Instant::now();
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                Some(entry) if entry.expires_at > now => return Ok(Some(entry.value.clone())),
                Some(_) => {}
                None => return Ok(None),
            }
        }
        // Expired: drop it so the map does not grow unbounded.
        self.entries.write().await.remove(key);
        Ok(None)
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let entry = MemoryEntry {
            value: value.to_string(),
            expires_at: Instant::now() + ttl,
        };
        self.entries.write().await.insert(key.to_string(), entry);
        Ok(())
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<usize, CacheError> {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|k, _| !k.starts_with(prefix));
        Ok(before - entries.len())
    }
}

/// Typed, failure-tolerant wrapper over a [`CacheBackend`].
#[derive(Clone)]
pub struct ResponseCache {
    backend: Arc<dyn CacheBackend>,
    ttl: Duration,
}

impl ResponseCache {
    pub fn new(backend: Arc<dyn CacheBackend>, ttl: Duration) -> Self {
        Self { backend, ttl }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Deterministic key for a request.
    ///
    /// The digest covers the canonical (key-sorted) JSON of the messages, the
    /// model and the temperature rounded to two decimals, so `0.7` and
    /// `0.700001` share a key while `0.71` does not.
    pub fn cache_key(messages: &[Message], model: &str, temperature: f64) -> String {
        let rounded = (temperature * 100.0).round() / 100.0;
        let canonical = serde_json::json!({
            "messages": messages,
            "model": model,
            "temperature": rounded,
        });

        let mut hasher = Sha256::new();
        hasher.update(canonical.to_string().as_bytes());
        let digest = hex::encode(hasher.finalize());

        format!("{}{}", CACHE_KEY_PREFIX, &digest[..KEY_HASH_LEN])
    }

    /// Look up and decode an entry; errors and undecodable values are misses.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = match self.backend.get(key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                tracing::debug!(key = key, "Response cache miss");
                return None;
            }
            Err(e) => {
                tracing::warn!(key = key, error = %e, "Response cache read failed, treating as miss");
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(value) => {
                tracing::debug!(key = key, "Response cache hit");
                Some(value)
            }
            Err(e) => {
                tracing::warn!(key = key, error = %e, "Cached response is not decodable, treating as miss");
                None
            }
        }
    }

    /// Store an entry with the configured TTL; failures are logged and skipped.
    pub async fn set<T: Serialize>(&self, key: &str, value: &T) {
        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(key = key, error = %e, "Failed to serialize response for cache");
                return;
            }
        };

        if let Err(e) = self.backend.set_ex(key, &raw, self.ttl).await {
            tracing::warn!(key = key, error = %e, "Response cache write failed, skipping");
        }
    }

    /// Remove every entry whose key starts with `prefix` (defaults to all
    /// response-cache keys when `prefix` is empty).
    pub async fn invalidate_prefix(&self, prefix: &str) -> usize {
        let prefix = if prefix.is_empty() {
            CACHE_KEY_PREFIX
        } else {
            prefix
        };

        match self.backend.delete_prefix(prefix).await {
            Ok(count) => {
                tracing::info!(prefix = prefix, deleted = count, "Invalidated response cache entries");
                count
            }
            Err(e) => {
                tracing::warn!(prefix = prefix, error = %e, "Response cache invalidation failed");
                0
            }
        }
    }
}

impl std::fmt::Debug for ResponseCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseCache")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

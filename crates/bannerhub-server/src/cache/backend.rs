//! Cache backends for active-banner snapshots.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bannerhub_storage::{CacheError, CacheStore};
use dashmap::DashMap;
use deadpool_redis::Pool;
use redis::AsyncCommands;
use tokio::time::Instant;

/// A cached entry with TTL support.
#[derive(Clone, Debug)]
pub struct CachedEntry {
    pub data: Arc<Vec<u8>>,
    pub cached_at: Instant,
    pub ttl: Duration,
}

impl CachedEntry {
    /// Create a new cached entry.
    pub fn new(data: Vec<u8>, ttl: Duration) -> Self {
        Self {
            data: Arc::new(data),
            cached_at: Instant::now(),
            ttl,
        }
    }

    /// Check if this entry has expired.
    pub fn is_expired(&self) -> bool {
        self.cached_at.elapsed() >= self.ttl
    }
}

/// Cache backend selected by configuration.
///
/// ## Cache Modes
///
/// - **Local**: Single-instance mode using a DashMap with per-entry expiry
/// - **Redis**: Multi-instance mode; entries expire server-side via `SET EX`
///
/// Instances never invalidate each other. A stale snapshot lives at most
/// one TTL.
#[derive(Clone)]
pub enum CacheBackend {
    /// Single-instance: local DashMap only
    Local(Arc<DashMap<String, CachedEntry>>),

    /// Multi-instance: shared Redis
    Redis(Pool),
}

impl CacheBackend {
    /// Create a new local-only cache backend.
    pub fn new_local() -> Self {
        CacheBackend::Local(Arc::new(DashMap::new()))
    }

    /// Create a new Redis-backed cache backend.
    pub fn new_redis(redis_pool: Pool) -> Self {
        CacheBackend::Redis(redis_pool)
    }

    /// Number of entries held locally, expired ones included.
    pub fn local_len(&self) -> usize {
        match self {
            CacheBackend::Local(map) => map.len(),
            CacheBackend::Redis(_) => 0,
        }
    }

    /// Check if Redis is available (for health checks).
    pub async fn is_redis_available(&self) -> bool {
        match self {
            CacheBackend::Local(_) => false,
            CacheBackend::Redis(redis) => redis.get().await.is_ok(),
        }
    }

    async fn redis_conn(redis: &Pool) -> Result<deadpool_redis::Connection, CacheError> {
        redis.get().await.map_err(|e| {
            tracing::warn!(error = %e, "Failed to get Redis connection");
            CacheError::unavailable(e.to_string())
        })
    }
}

#[async_trait]
impl CacheStore for CacheBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        match self {
            CacheBackend::Local(map) => {
                let hit = map
                    .get(key)
                    .filter(|entry| !entry.is_expired())
                    .map(|entry| entry.data.as_ref().clone());
                if hit.is_none() {
                    // Drop an expired entry so it stops counting towards the map size.
                    map.remove_if(key, |_, entry| entry.is_expired());
                }
                Ok(hit)
            }
            CacheBackend::Redis(redis) => {
                let mut conn = Self::redis_conn(redis).await?;
                match conn.get::<_, Option<Vec<u8>>>(key).await {
                    Ok(data) => {
                        tracing::debug!(key = %key, hit = data.is_some(), "cache lookup");
                        Ok(data)
                    }
                    Err(e) => {
                        tracing::warn!(key = %key, error = %e, "Redis GET error");
                        Err(CacheError::command(e.to_string()))
                    }
                }
            }
        }
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError> {
        match self {
            CacheBackend::Local(map) => {
                map.insert(key.to_string(), CachedEntry::new(value, ttl));
                Ok(())
            }
            CacheBackend::Redis(redis) => {
                let mut conn = Self::redis_conn(redis).await?;
                // Redis rejects EX 0, so sub-second TTLs round up.
                let ttl_secs = ttl.as_secs().max(1);
                conn.set_ex::<_, _, ()>(key, value, ttl_secs)
                    .await
                    .map_err(|e| {
                        tracing::warn!(key = %key, error = %e, "Redis SET error");
                        CacheError::command(e.to_string())
                    })?;
                tracing::debug!(key = %key, ttl_secs, "cache set");
                Ok(())
            }
        }
    }

    fn backend_name(&self) -> &'static str {
        match self {
            CacheBackend::Local(_) => "local",
            CacheBackend::Redis(_) => "redis",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_local_entry_expires_after_ttl() {
        let cache = CacheBackend::new_local();
        cache
            .set("k", b"v".to_vec(), Duration::from_secs(5))
            .await
            .unwrap();

        tokio::time::advance(Duration::from_secs(4)).await;
        assert_eq!(cache.get("k").await.unwrap(), Some(b"v".to_vec()));

        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(cache.get("k").await.unwrap(), None);
        assert_eq!(cache.local_len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_refreshes_ttl() {
        let cache = CacheBackend::new_local();
        let ttl = Duration::from_secs(5);
        cache.set("k", b"1".to_vec(), ttl).await.unwrap();

        tokio::time::advance(Duration::from_secs(4)).await;
        cache.set("k", b"2".to_vec(), ttl).await.unwrap();

        tokio::time::advance(Duration::from_secs(4)).await;
        assert_eq!(cache.get("k").await.unwrap(), Some(b"2".to_vec()));
    }

    #[tokio::test]
    async fn test_miss_is_ok_none() {
        let cache = CacheBackend::new_local();
        assert_eq!(cache.get("missing").await.unwrap(), None);
        assert_eq!(cache.backend_name(), "local");
        assert!(!cache.is_redis_available().await);
    }
}

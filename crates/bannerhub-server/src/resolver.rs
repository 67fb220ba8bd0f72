//! Cache-aside lookup of the active banner for a feature and tag.

use std::sync::Arc;
use std::time::Duration;

use bannerhub_storage::{Banner, CacheError, DynBannerStore, DynCacheStore, FeatureId, TagId};
use tracing::{debug, warn};

use crate::cache::{CacheFailurePolicy, CacheOp, FailClosed, banner_key};
use crate::error::{ServiceError, ServiceResult};

/// Resolves the active banner, reading through the cache.
///
/// Each call reads the store at most once. Entries are written only after a
/// store read on the cached path and are never invalidated; they expire
/// after `ttl`.
#[derive(Clone)]
pub struct ActiveBannerResolver {
    store: DynBannerStore,
    cache: DynCacheStore,
    policy: Arc<dyn CacheFailurePolicy>,
    ttl: Duration,
}

impl ActiveBannerResolver {
    /// Creates a resolver with the fail-closed policy.
    pub fn new(store: DynBannerStore, cache: DynCacheStore, ttl: Duration) -> Self {
        Self {
            store,
            cache,
            policy: Arc::new(FailClosed),
            ttl,
        }
    }

    #[must_use]
    pub fn with_policy(mut self, policy: Arc<dyn CacheFailurePolicy>) -> Self {
        self.policy = policy;
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Returns the active banner for `(feature_id, tag_id)`.
    ///
    /// With `bypass_cache` the cache is neither read nor written.
    ///
    /// # Errors
    ///
    /// - `OutOfRange` if either id is not positive
    /// - `NotFound` if no active banner matches
    /// - `Cache` if the cache fails and the policy propagates it
    /// - `Store` if the relational store fails
    pub async fn resolve(
        &self,
        feature_id: FeatureId,
        tag_id: TagId,
        bypass_cache: bool,
    ) -> ServiceResult<Banner> {
        if feature_id <= 0 {
            return Err(ServiceError::out_of_range("feature_id"));
        }
        if tag_id <= 0 {
            return Err(ServiceError::out_of_range("tag_id"));
        }

        if bypass_cache {
            return self.load(feature_id, tag_id).await;
        }

        let key = banner_key(feature_id, tag_id);
        if let Some(banner) = self.lookup(&key).await? {
            debug!(key = %key, "cache hit");
            return Ok(banner);
        }

        let banner = self.load(feature_id, tag_id).await?;
        self.store_snapshot(&key, &banner).await?;
        Ok(banner)
    }

    async fn load(&self, feature_id: FeatureId, tag_id: TagId) -> ServiceResult<Banner> {
        self.store
            .get_active_banner(feature_id, tag_id)
            .await?
            .ok_or(ServiceError::NotFound)
    }

    /// Reads and decodes a cached snapshot; undecodable bytes count as a miss.
    async fn lookup(&self, key: &str) -> Result<Option<Banner>, CacheError> {
        let data = match self.cache.get(key).await {
            Ok(Some(data)) => data,
            Ok(None) => return Ok(None),
            Err(err) => {
                self.policy.on_failure(CacheOp::Get, key, err)?;
                return Ok(None);
            }
        };

        match rmp_serde::from_slice::<Banner>(&data) {
            Ok(banner) => Ok(Some(banner)),
            Err(e) => {
                warn!(key = %key, error = %e, "Failed to deserialize cached banner");
                Ok(None)
            }
        }
    }

    async fn store_snapshot(&self, key: &str, banner: &Banner) -> Result<(), CacheError> {
        let data = match rmp_serde::to_vec_named(banner) {
            Ok(data) => data,
            Err(e) => {
                let err = CacheError::encoding(e.to_string());
                return self.policy.on_failure(CacheOp::Set, key, err);
            }
        };

        match self.cache.set(key, data, self.ttl).await {
            Ok(()) => Ok(()),
            Err(err) => self.policy.on_failure(CacheOp::Set, key, err),
        }
    }
}

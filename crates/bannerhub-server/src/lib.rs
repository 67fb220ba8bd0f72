//! BannerHub service core.
//!
//! Resolves the active banner for a feature and tag through a read-through
//! cache, and deletes banners asynchronously in batches.

pub mod cache;
pub mod config;
pub mod deletion;
pub mod error;
pub mod observability;
pub mod resolver;
pub mod service;

use std::sync::Arc;

use bannerhub_storage::{DynBannerStore, StorageError};
use crate::config::{RedisConfig, StorageBackend, StorageConfig};

pub use cache::CacheBackend;
pub use crate::config::AppConfig;
pub use deletion::{DeletionBatcher, DeletionWorker};
pub use error::{ServiceError, ServiceResult};
pub use resolver::ActiveBannerResolver;
pub use service::{BannerPatch, BannerService, CreateBanner};

/// Creates the relational store named in configuration.
pub async fn create_banner_store(config: &StorageConfig) -> Result<DynBannerStore, StorageError> {
    match config.backend {
        StorageBackend::Postgres => {
            bannerhub_db_postgres::create_banner_store(config.postgres.clone()).await
        }
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory banner store; data is lost on restart");
            Ok(bannerhub_db_memory::create_banner_store())
        }
    }
}

/// Creates the cache backend based on configuration.
///
/// Falls back to the local cache when Redis is disabled or unreachable at
/// startup. Once Redis is in use its failures go through the resolver's
/// failure policy.
pub async fn create_cache_backend(config: &RedisConfig) -> CacheBackend {
    use std::time::Duration;

    if !config.enabled {
        tracing::info!("Redis disabled, using local cache only");
        return CacheBackend::new_local();
    }

    tracing::info!(url = %config.url, "Connecting to Redis");

    let mut redis_config = deadpool_redis::Config::from_url(&config.url);
    let mut pool_config = deadpool_redis::PoolConfig::new(config.pool_size);
    pool_config.timeouts.wait = Some(Duration::from_millis(config.timeout_ms));
    pool_config.timeouts.create = Some(Duration::from_millis(config.timeout_ms));
    pool_config.timeouts.recycle = Some(Duration::from_millis(config.timeout_ms));
    redis_config.pool = Some(pool_config);

    let pool = match redis_config.create_pool(Some(deadpool_redis::Runtime::Tokio1)) {
        Ok(pool) => pool,
        Err(e) => {
            tracing::warn!(
                error = %e,
                "Failed to create Redis pool. Falling back to local cache."
            );
            return CacheBackend::new_local();
        }
    };

    let backend = CacheBackend::new_redis(pool);
    if backend.is_redis_available().await {
        tracing::info!("Connected to Redis");
        backend
    } else {
        tracing::warn!("Failed to connect to Redis. Falling back to local cache.");
        CacheBackend::new_local()
    }
}

/// Builds the store, cache and service from configuration.
pub async fn build_service(config: &AppConfig) -> ServiceResult<BannerService> {
    let store = create_banner_store(&config.storage).await?;
    let cache = Arc::new(create_cache_backend(&config.redis).await);
    BannerService::new(store, cache, config)
}

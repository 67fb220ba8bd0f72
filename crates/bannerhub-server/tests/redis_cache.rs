//! Integration tests for the Redis cache backend.
//!
//! Tests use testcontainers to spin up a real Redis instance and are ignored
//! without Docker: `cargo test -- --ignored`.

mod common;

use std::sync::Arc;
use std::time::Duration;

use bannerhub_server::config::RedisConfig;
use bannerhub_server::{ActiveBannerResolver, CacheBackend, create_cache_backend};
use bannerhub_storage::CacheStore;
use common::RecordingStore;
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::redis::Redis;
use tokio::sync::OnceCell;

// Shared Redis container for all tests
static SHARED_REDIS: OnceCell<(ContainerAsync<Redis>, String)> = OnceCell::const_new();

/// Get or create the shared Redis container
async fn get_redis_url() -> String {
    let (_, url) = SHARED_REDIS
        .get_or_init(|| async {
            let container = Redis::default()
                .start()
                .await
                .expect("start redis container");

            let host_port = container.get_host_port_ipv4(6379).await.expect("get port");
            let url = format!("redis://127.0.0.1:{host_port}");

            (container, url)
        })
        .await;

    url.clone()
}

async fn redis_backend() -> CacheBackend {
    let config = RedisConfig {
        enabled: true,
        url: get_redis_url().await,
        pool_size: 5,
        timeout_ms: 5000,
    };
    create_cache_backend(&config).await
}

#[tokio::test]
async fn test_disabled_redis_uses_local_cache() {
    let cache = create_cache_backend(&RedisConfig::default()).await;
    assert_eq!(cache.backend_name(), "local");
}

#[tokio::test]
async fn test_unreachable_redis_falls_back_to_local() {
    let config = RedisConfig {
        enabled: true,
        url: "redis://127.0.0.1:1".into(),
        pool_size: 1,
        timeout_ms: 200,
    };
    let cache = create_cache_backend(&config).await;
    assert_eq!(cache.backend_name(), "local");
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_redis_cache_connection() {
    let cache = redis_backend().await;
    assert!(cache.is_redis_available().await);
    assert_eq!(cache.backend_name(), "redis");
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_redis_get_set_and_miss() {
    let cache = redis_backend().await;

    cache
        .set("redis_test_key", b"redis_test_value".to_vec(), Duration::from_secs(60))
        .await
        .unwrap();
    assert_eq!(
        cache.get("redis_test_key").await.unwrap(),
        Some(b"redis_test_value".to_vec())
    );
    assert_eq!(cache.get("redis_missing_key").await.unwrap(), None);
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_redis_entry_expires() {
    let cache = redis_backend().await;

    // Sub-second TTLs are rounded up to one second.
    cache
        .set("expiring_key", b"value".to_vec(), Duration::from_millis(100))
        .await
        .unwrap();
    assert!(cache.get("expiring_key").await.unwrap().is_some());

    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert!(cache.get("expiring_key").await.unwrap().is_none());
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_snapshot_shared_between_instances() {
    let store = RecordingStore::new();
    let id = store.seed(1, vec![2], true).await;
    let ttl = Duration::from_secs(60);

    let first = ActiveBannerResolver::new(store.clone(), Arc::new(redis_backend().await), ttl);
    let second = ActiveBannerResolver::new(store.clone(), Arc::new(redis_backend().await), ttl);

    assert_eq!(first.resolve(1, 2, false).await.unwrap().id, id);
    assert_eq!(second.resolve(1, 2, false).await.unwrap().id, id);
    assert_eq!(store.active_reads(), 1);
}

//! Test doubles shared by the service integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bannerhub_db_memory::InMemoryBannerStore;
use bannerhub_storage::{
    Banner, BannerContent, BannerId, BannerStore, CacheError, CacheStore, FeatureId, NewBanner,
    StorageError, TagAssociation, TagId,
};

/// In-memory store that records reads and bulk deletes and can be told to
/// fail, panic or hang on the next flushes.
#[derive(Default)]
pub struct RecordingStore {
    inner: InMemoryBannerStore,
    pub active_reads: AtomicUsize,
    batches: Mutex<Vec<Vec<BannerId>>>,
    fail_flushes: AtomicUsize,
    panic_flushes: AtomicUsize,
    hang_flushes: AtomicBool,
}

impl RecordingStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Every `bulk_delete` call so far, failed ones included.
    pub fn batches(&self) -> Vec<Vec<BannerId>> {
        self.batches.lock().unwrap().clone()
    }

    pub fn active_reads(&self) -> usize {
        self.active_reads.load(Ordering::SeqCst)
    }

    pub fn fail_next_flushes(&self, n: usize) {
        self.fail_flushes.store(n, Ordering::SeqCst);
    }

    pub fn panic_next_flushes(&self, n: usize) {
        self.panic_flushes.store(n, Ordering::SeqCst);
    }

    pub fn hang_flushes(&self) {
        self.hang_flushes.store(true, Ordering::SeqCst);
    }

    pub async fn seed(&self, feature_id: FeatureId, tag_ids: Vec<TagId>, active: bool) -> BannerId {
        self.inner
            .create_banner(NewBanner {
                feature_id,
                tag_ids,
                content: BannerContent::new("title", "text", "https://example.com"),
                is_active: active,
            })
            .await
            .unwrap()
    }

    fn take(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl BannerStore for RecordingStore {
    async fn get_active_banner(
        &self,
        feature_id: FeatureId,
        tag_id: TagId,
    ) -> Result<Option<Banner>, StorageError> {
        self.active_reads.fetch_add(1, Ordering::SeqCst);
        self.inner.get_active_banner(feature_id, tag_id).await
    }

    async fn get_banner(&self, id: BannerId) -> Result<Option<Banner>, StorageError> {
        self.inner.get_banner(id).await
    }

    async fn tag_associations(
        &self,
        id: BannerId,
    ) -> Result<Vec<TagAssociation>, StorageError> {
        self.inner.tag_associations(id).await
    }

    async fn create_banner(&self, banner: NewBanner) -> Result<BannerId, StorageError> {
        self.inner.create_banner(banner).await
    }

    async fn update_content(
        &self,
        id: BannerId,
        content: &BannerContent,
    ) -> Result<(), StorageError> {
        self.inner.update_content(id, content).await
    }

    async fn set_active(&self, id: BannerId, is_active: bool) -> Result<(), StorageError> {
        self.inner.set_active(id, is_active).await
    }

    async fn set_feature(&self, id: BannerId, feature_id: FeatureId) -> Result<(), StorageError> {
        self.inner.set_feature(id, feature_id).await
    }

    async fn replace_tags(&self, id: BannerId, tag_ids: &[TagId]) -> Result<(), StorageError> {
        self.inner.replace_tags(id, tag_ids).await
    }

    async fn delete_banner(&self, id: BannerId) -> Result<(), StorageError> {
        self.inner.delete_banner(id).await
    }

    async fn bulk_delete(&self, ids: &[BannerId]) -> Result<(), StorageError> {
        self.batches.lock().unwrap().push(ids.to_vec());

        if self.hang_flushes.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if Self::take(&self.panic_flushes) {
            panic!("store exploded");
        }
        if Self::take(&self.fail_flushes) {
            return Err(StorageError::connection_error("connection reset"));
        }
        self.inner.bulk_delete(ids).await
    }

    fn backend_name(&self) -> &'static str {
        "recording"
    }
}

/// Map-backed cache that counts calls and can be told to fail.
#[derive(Default)]
pub struct FakeCache {
    entries: Mutex<HashMap<String, (Vec<u8>, Duration)>>,
    pub gets: AtomicUsize,
    pub sets: AtomicUsize,
    pub fail_get: AtomicBool,
    pub fail_set: AtomicBool,
}

impl FakeCache {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn gets(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    pub fn sets(&self) -> usize {
        self.sets.load(Ordering::SeqCst)
    }

    pub fn ttl_of(&self, key: &str) -> Option<Duration> {
        self.entries.lock().unwrap().get(key).map(|(_, ttl)| *ttl)
    }

    pub fn put_raw(&self, key: &str, data: Vec<u8>) {
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), (data, Duration::from_secs(60)));
    }
}

#[async_trait]
impl CacheStore for FakeCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        if self.fail_get.load(Ordering::SeqCst) {
            return Err(CacheError::unavailable("connection refused"));
        }
        Ok(self.entries.lock().unwrap().get(key).map(|(data, _)| data.clone()))
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError> {
        self.sets.fetch_add(1, Ordering::SeqCst);
        if self.fail_set.load(Ordering::SeqCst) {
            return Err(CacheError::command("OOM command not allowed"));
        }
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), (value, ttl));
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "fake"
    }
}

//! Service facade used by the HTTP layer.

use bannerhub_storage::{
    Banner, BannerContent, BannerId, DynBannerStore, DynCacheStore, FeatureId, NewBanner, TagId,
};
use serde::Deserialize;
use serde_json::Value;

use crate::cache::policy_from_config;
use crate::config::AppConfig;
use crate::deletion::DeletionBatcher;
use crate::error::{ServiceError, ServiceResult};
use crate::resolver::ActiveBannerResolver;

/// Body of a create request.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateBanner {
    pub feature_id: FeatureId,
    pub tag_ids: Vec<TagId>,
    /// Must be an object with string `title`, `text` and `url`.
    pub content: Value,
    pub is_active: bool,
}

/// Body of a partial update. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BannerPatch {
    pub content: Option<Value>,
    pub is_active: Option<bool>,
    pub feature_id: Option<FeatureId>,
    pub tag_ids: Option<Vec<TagId>>,
}

impl BannerPatch {
    pub fn is_empty(&self) -> bool {
        self.content.is_none()
            && self.is_active.is_none()
            && self.feature_id.is_none()
            && self.tag_ids.is_none()
    }
}

#[derive(Clone)]
pub struct BannerService {
    store: DynBannerStore,
    resolver: ActiveBannerResolver,
    batcher: DeletionBatcher,
}

impl BannerService {
    /// Builds the service and spawns the deletion worker.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the deletion settings are unusable.
    pub fn new(
        store: DynBannerStore,
        cache: DynCacheStore,
        config: &AppConfig,
    ) -> ServiceResult<Self> {
        let resolver = ActiveBannerResolver::new(store.clone(), cache, config.cache.ttl())
            .with_policy(policy_from_config(config.cache.failure_policy));
        let batcher = DeletionBatcher::spawn(store.clone(), &config.deletion)?;

        tracing::info!(
            store = store.backend_name(),
            ttl_secs = config.cache.ttl_secs,
            failure_policy = ?config.cache.failure_policy,
            "Banner service started"
        );

        Ok(Self::from_parts(store, resolver, batcher))
    }

    pub fn from_parts(
        store: DynBannerStore,
        resolver: ActiveBannerResolver,
        batcher: DeletionBatcher,
    ) -> Self {
        Self {
            store,
            resolver,
            batcher,
        }
    }

    pub fn resolver(&self) -> &ActiveBannerResolver {
        &self.resolver
    }

    pub fn batcher(&self) -> &DeletionBatcher {
        &self.batcher
    }

    /// Returns the active banner for `(feature_id, tag_id)`.
    pub async fn resolve(
        &self,
        feature_id: FeatureId,
        tag_id: TagId,
        use_last_revision: bool,
    ) -> ServiceResult<Banner> {
        self.resolver
            .resolve(feature_id, tag_id, use_last_revision)
            .await
    }

    /// Creates a banner with its tag associations.
    pub async fn create(&self, request: CreateBanner) -> ServiceResult<BannerId> {
        check_id("feature_id", request.feature_id)?;
        check_tags(&request.tag_ids)?;
        let content = BannerContent::from_value(&request.content)?;

        let id = self
            .store
            .create_banner(NewBanner {
                feature_id: request.feature_id,
                tag_ids: request.tag_ids,
                content,
                is_active: request.is_active,
            })
            .await?;
        tracing::info!(banner_id = id, "Banner created");
        Ok(id)
    }

    /// Applies a partial update.
    ///
    /// Every present field is validated before anything is written. Each
    /// field is written separately; tag replacement runs in its own
    /// transaction.
    pub async fn patch(&self, id: BannerId, patch: BannerPatch) -> ServiceResult<()> {
        check_id("id", id)?;
        let content = patch
            .content
            .as_ref()
            .map(BannerContent::from_value)
            .transpose()?;
        if let Some(feature_id) = patch.feature_id {
            check_id("feature_id", feature_id)?;
        }
        if let Some(tag_ids) = &patch.tag_ids {
            check_tags(tag_ids)?;
        }

        if self.store.get_banner(id).await?.is_none() {
            return Err(ServiceError::NotFound);
        }

        if let Some(content) = &content {
            self.store.update_content(id, content).await?;
        }
        if let Some(is_active) = patch.is_active {
            self.store.set_active(id, is_active).await?;
        }
        if let Some(feature_id) = patch.feature_id {
            self.store.set_feature(id, feature_id).await?;
        }
        if let Some(tag_ids) = &patch.tag_ids {
            self.store.replace_tags(id, tag_ids).await?;
        }

        tracing::info!(banner_id = id, "Banner updated");
        Ok(())
    }

    /// Deletes a banner immediately.
    pub async fn delete(&self, id: BannerId) -> ServiceResult<()> {
        check_id("id", id)?;
        self.store.delete_banner(id).await?;
        tracing::info!(banner_id = id, "Banner deleted");
        Ok(())
    }

    /// Queues a banner for batched deletion.
    pub async fn enqueue_delete(&self, id: BannerId) -> ServiceResult<()> {
        self.batcher.enqueue(id).await
    }

    /// Stops the deletion worker, waiting for its final flush.
    pub async fn stop(&self) -> ServiceResult<()> {
        self.batcher.stop().await
    }
}

fn check_id(field: &str, id: i64) -> ServiceResult<()> {
    if id <= 0 {
        return Err(ServiceError::out_of_range(field));
    }
    Ok(())
}

fn check_tags(tag_ids: &[TagId]) -> ServiceResult<()> {
    if tag_ids.iter().any(|&tag_id| tag_id <= 0) {
        return Err(ServiceError::out_of_range("tag_ids"));
    }
    Ok(())
}

//! Storage traits for the banner storage abstraction layer.
//!
//! This module defines the contracts the relational store and the cache store
//! backends must implement.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::{CacheError, StorageError};
use crate::types::{
    Banner, BannerContent, BannerId, FeatureId, NewBanner, TagAssociation, TagId,
};

/// Durable store for banners and their tag associations.
///
/// Implementations must be thread-safe (`Send + Sync`) and apply every
/// multi-row write atomically.
///
/// # Example
///
/// ```ignore
/// use bannerhub_storage::{BannerStore, StorageError};
///
/// async fn title_of(store: &dyn BannerStore, id: i64) -> Result<String, StorageError> {
///     store
///         .get_banner(id)
///         .await?
///         .map(|b| b.content.title)
///         .ok_or_else(|| StorageError::not_found("Banner", id))
/// }
/// ```
#[async_trait]
pub trait BannerStore: Send + Sync {
    // ==================== Reads ====================

    /// Returns the active banner bound to `(feature_id, tag_id)`.
    ///
    /// Returns `None` when no active banner matches. Retired associations
    /// never match.
    async fn get_active_banner(
        &self,
        feature_id: FeatureId,
        tag_id: TagId,
    ) -> Result<Option<Banner>, StorageError>;

    /// Returns a banner by id regardless of its active flag.
    async fn get_banner(&self, id: BannerId) -> Result<Option<Banner>, StorageError>;

    /// Returns every association row of a banner in position order,
    /// retired rows included.
    async fn tag_associations(&self, id: BannerId)
    -> Result<Vec<TagAssociation>, StorageError>;

    // ==================== Writes ====================

    /// Creates a banner and its initial associations in one transaction.
    async fn create_banner(&self, banner: NewBanner) -> Result<BannerId, StorageError>;

    /// Replaces the banner content.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the banner does not exist.
    async fn update_content(
        &self,
        id: BannerId,
        content: &BannerContent,
    ) -> Result<(), StorageError>;

    /// Sets the active flag.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the banner does not exist.
    async fn set_active(&self, id: BannerId, is_active: bool) -> Result<(), StorageError>;

    /// Moves the banner to another feature.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the banner does not exist.
    async fn set_feature(&self, id: BannerId, feature_id: FeatureId) -> Result<(), StorageError>;

    /// Reconciles the banner's associations with `tag_ids`.
    ///
    /// Runs [`crate::plan_reconciliation`] and applies it in one transaction;
    /// on any failure the previous associations stay intact.
    async fn replace_tags(&self, id: BannerId, tag_ids: &[TagId]) -> Result<(), StorageError>;

    /// Deletes one banner.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the banner does not exist.
    async fn delete_banner(&self, id: BannerId) -> Result<(), StorageError>;

    /// Deletes every banner in `ids` in one transaction.
    ///
    /// Ids that no longer exist are skipped so that a stale id cannot block
    /// the rest of the batch.
    async fn bulk_delete(&self, ids: &[BannerId]) -> Result<(), StorageError>;

    /// Returns the name of this storage backend for logging/debugging.
    fn backend_name(&self) -> &'static str;
}

/// Key/value cache with per-key TTL.
///
/// A miss is `Ok(None)`; `Err` is reserved for backend failures so callers
/// can tell the two apart.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Reads a value.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError>;

    /// Writes a value that expires after `ttl`.
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError>;

    /// Returns the name of this cache backend for logging/debugging.
    fn backend_name(&self) -> &'static str;
}

//! PostgreSQL implementation of the `BannerStore` trait.

use async_trait::async_trait;
use sqlx_postgres::{PgPool, PgTransaction};
use tracing::{debug, instrument};

use bannerhub_storage::{
    Banner, BannerContent, BannerId, BannerStore, FeatureId, NewBanner, StorageError,
    TagAssociation, TagId, TagOp, plan_reconciliation,
};

use crate::config::PostgresConfig;
use crate::migrations;
use crate::pool;
use crate::queries::{banners, tags};

/// PostgreSQL storage backend for banners.
///
/// Multi-row writes run in a single transaction; a transaction dropped
/// without commit is rolled back by sqlx.
#[derive(Debug, Clone)]
pub struct PostgresBannerStore {
    pool: PgPool,
}

impl PostgresBannerStore {
    /// Creates a new store with the given configuration.
    ///
    /// This will:
    /// 1. Create a connection pool
    /// 2. Run migrations (if configured)
    ///
    /// # Errors
    ///
    /// Returns an error if the connection pool cannot be created
    /// or if migrations fail.
    pub async fn new(config: PostgresConfig) -> Result<Self, StorageError> {
        let pool = pool::create_pool(&config).await?;

        if config.run_migrations {
            migrations::run(&pool).await?;
        }

        Ok(Self { pool })
    }

    /// Creates a store from an existing connection pool.
    ///
    /// Migrations are not run automatically when using this constructor.
    #[must_use]
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Returns a reference to the connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn begin(&self) -> Result<PgTransaction<'static>, StorageError> {
        self.pool.begin().await.map_err(|e| {
            StorageError::transaction_error(format!("Failed to begin transaction: {e}"))
        })
    }

    async fn commit(tx: PgTransaction<'static>) -> Result<(), StorageError> {
        tx.commit().await.map_err(|e| {
            StorageError::transaction_error(format!("Failed to commit transaction: {e}"))
        })
    }
}

#[async_trait]
impl BannerStore for PostgresBannerStore {
    async fn get_active_banner(
        &self,
        feature_id: FeatureId,
        tag_id: TagId,
    ) -> Result<Option<Banner>, StorageError> {
        banners::get_active(&self.pool, feature_id, tag_id).await
    }

    async fn get_banner(&self, id: BannerId) -> Result<Option<Banner>, StorageError> {
        banners::get(&self.pool, id).await
    }

    async fn tag_associations(
        &self,
        id: BannerId,
    ) -> Result<Vec<TagAssociation>, StorageError> {
        tags::list(&self.pool, id, false).await
    }

    #[instrument(skip(self, banner), fields(feature_id = banner.feature_id))]
    async fn create_banner(&self, banner: NewBanner) -> Result<BannerId, StorageError> {
        let mut tx = self.begin().await?;

        let id = banners::insert(&mut *tx, &banner).await?;
        for &tag_id in &banner.tag_ids {
            tags::insert(&mut *tx, id, tag_id).await?;
        }

        Self::commit(tx).await?;
        debug!(banner_id = id, tags = banner.tag_ids.len(), "Banner created");
        Ok(id)
    }

    async fn update_content(
        &self,
        id: BannerId,
        content: &BannerContent,
    ) -> Result<(), StorageError> {
        banners::update_content(&self.pool, id, content).await
    }

    async fn set_active(&self, id: BannerId, is_active: bool) -> Result<(), StorageError> {
        banners::set_active(&self.pool, id, is_active).await
    }

    async fn set_feature(&self, id: BannerId, feature_id: FeatureId) -> Result<(), StorageError> {
        banners::set_feature(&self.pool, id, feature_id).await
    }

    #[instrument(skip(self, tag_ids), fields(target_len = tag_ids.len()))]
    async fn replace_tags(&self, id: BannerId, tag_ids: &[TagId]) -> Result<(), StorageError> {
        let mut tx = self.begin().await?;

        // Locks the banner row first so concurrent reconciliations serialize.
        banners::touch(&mut *tx, id).await?;
        let current = tags::list(&mut *tx, id, true).await?;

        let ops = plan_reconciliation(&current, tag_ids);
        for op in &ops {
            match *op {
                TagOp::Overwrite {
                    association_id,
                    slot,
                } => tags::overwrite(&mut *tx, association_id, slot).await?,
                TagOp::Create { tag_id } => tags::insert(&mut *tx, id, tag_id).await?,
            }
        }

        Self::commit(tx).await?;
        debug!(
            banner_id = id,
            current_len = current.len(),
            ops = ops.len(),
            "Tag associations reconciled"
        );
        Ok(())
    }

    async fn delete_banner(&self, id: BannerId) -> Result<(), StorageError> {
        banners::delete(&self.pool, id).await
    }

    #[instrument(skip(self, ids), fields(count = ids.len()))]
    async fn bulk_delete(&self, ids: &[BannerId]) -> Result<(), StorageError> {
        if ids.is_empty() {
            return Ok(());
        }
        let deleted = banners::delete_many(&self.pool, ids).await?;
        debug!(requested = ids.len(), deleted, "Bulk delete applied");
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}

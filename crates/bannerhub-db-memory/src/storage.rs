use std::collections::BTreeMap;

use async_trait::async_trait;
use bannerhub_storage::{
    AssociationId, Banner, BannerContent, BannerId, BannerStore, FeatureId, NewBanner,
    StorageError, TagAssociation, TagId, TagOp, TagSlot, plan_reconciliation,
};
use time::OffsetDateTime;
use tokio::sync::RwLock;

#[derive(Debug, Clone)]
struct BannerRow {
    feature_id: FeatureId,
    content: BannerContent,
    is_active: bool,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

#[derive(Debug, Default)]
struct State {
    banners: BTreeMap<BannerId, BannerRow>,
    /// Keyed by association id, so iteration order is insertion order.
    associations: BTreeMap<AssociationId, TagAssociation>,
    next_banner_id: BannerId,
    next_association_id: AssociationId,
}

impl State {
    fn associations_of(&self, banner_id: BannerId) -> Vec<TagAssociation> {
        self.associations
            .values()
            .filter(|a| a.banner_id == banner_id)
            .copied()
            .collect()
    }

    fn snapshot(&self, id: BannerId, row: &BannerRow) -> Banner {
        Banner {
            id,
            feature_id: row.feature_id,
            tag_ids: self
                .associations_of(id)
                .into_iter()
                .filter_map(|a| a.slot.tag_id())
                .collect(),
            content: row.content.clone(),
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }

    fn insert_association(&mut self, banner_id: BannerId, tag_id: TagId) {
        self.next_association_id += 1;
        let id = self.next_association_id;
        self.associations.insert(
            id,
            TagAssociation {
                id,
                banner_id,
                slot: TagSlot::Active(tag_id),
            },
        );
    }

    fn row_mut(&mut self, id: BannerId) -> Result<&mut BannerRow, StorageError> {
        self.banners
            .get_mut(&id)
            .ok_or_else(|| StorageError::not_found("Banner", id))
    }

    fn remove_banner(&mut self, id: BannerId) -> bool {
        if self.banners.remove(&id).is_none() {
            return false;
        }
        self.associations.retain(|_, a| a.banner_id != id);
        true
    }
}

/// In-memory banner store.
///
/// A single `RwLock` guards the whole state, which makes every write
/// (including tag reconciliation) atomic with respect to other callers.
#[derive(Debug, Default)]
pub struct InMemoryBannerStore {
    state: RwLock<State>,
}

impl InMemoryBannerStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored banners.
    pub async fn len(&self) -> usize {
        self.state.read().await.banners.len()
    }

    /// Returns `true` if no banner is stored.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl BannerStore for InMemoryBannerStore {
    async fn get_active_banner(
        &self,
        feature_id: FeatureId,
        tag_id: TagId,
    ) -> Result<Option<Banner>, StorageError> {
        let state = self.state.read().await;
        let found = state.banners.iter().find(|(id, row)| {
            row.is_active
                && row.feature_id == feature_id
                && state
                    .associations
                    .values()
                    .any(|a| a.banner_id == **id && a.slot == TagSlot::Active(tag_id))
        });
        Ok(found.map(|(id, row)| state.snapshot(*id, row)))
    }

    async fn get_banner(&self, id: BannerId) -> Result<Option<Banner>, StorageError> {
        let state = self.state.read().await;
        Ok(state.banners.get(&id).map(|row| state.snapshot(id, row)))
    }

    async fn tag_associations(
        &self,
        id: BannerId,
    ) -> Result<Vec<TagAssociation>, StorageError> {
        Ok(self.state.read().await.associations_of(id))
    }

    async fn create_banner(&self, banner: NewBanner) -> Result<BannerId, StorageError> {
        let mut state = self.state.write().await;
        state.next_banner_id += 1;
        let id = state.next_banner_id;
        let now = OffsetDateTime::now_utc();
        state.banners.insert(
            id,
            BannerRow {
                feature_id: banner.feature_id,
                content: banner.content,
                is_active: banner.is_active,
                created_at: now,
                updated_at: now,
            },
        );
        for tag_id in banner.tag_ids {
            state.insert_association(id, tag_id);
        }
        Ok(id)
    }

    async fn update_content(
        &self,
        id: BannerId,
        content: &BannerContent,
    ) -> Result<(), StorageError> {
        let mut state = self.state.write().await;
        let row = state.row_mut(id)?;
        row.content = content.clone();
        row.updated_at = OffsetDateTime::now_utc();
        Ok(())
    }

    async fn set_active(&self, id: BannerId, is_active: bool) -> Result<(), StorageError> {
        let mut state = self.state.write().await;
        let row = state.row_mut(id)?;
        row.is_active = is_active;
        row.updated_at = OffsetDateTime::now_utc();
        Ok(())
    }

    async fn set_feature(&self, id: BannerId, feature_id: FeatureId) -> Result<(), StorageError> {
        let mut state = self.state.write().await;
        let row = state.row_mut(id)?;
        row.feature_id = feature_id;
        row.updated_at = OffsetDateTime::now_utc();
        Ok(())
    }

    async fn replace_tags(&self, id: BannerId, tag_ids: &[TagId]) -> Result<(), StorageError> {
        let mut state = self.state.write().await;
        if !state.banners.contains_key(&id) {
            return Err(StorageError::not_found("Banner", id));
        }

        let current = state.associations_of(id);
        for op in plan_reconciliation(&current, tag_ids) {
            match op {
                TagOp::Overwrite {
                    association_id,
                    slot,
                } => {
                    let association = state.associations.get_mut(&association_id).ok_or_else(
                        || StorageError::transaction_error("association vanished mid-update"),
                    )?;
                    association.slot = slot;
                }
                TagOp::Create { tag_id } => state.insert_association(id, tag_id),
            }
        }
        state.row_mut(id)?.updated_at = OffsetDateTime::now_utc();
        Ok(())
    }

    async fn delete_banner(&self, id: BannerId) -> Result<(), StorageError> {
        let mut state = self.state.write().await;
        if state.remove_banner(id) {
            Ok(())
        } else {
            Err(StorageError::not_found("Banner", id))
        }
    }

    async fn bulk_delete(&self, ids: &[BannerId]) -> Result<(), StorageError> {
        let mut state = self.state.write().await;
        for &id in ids {
            state.remove_banner(id);
        }
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

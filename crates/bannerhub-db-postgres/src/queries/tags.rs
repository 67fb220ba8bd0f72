//! Tag association queries.

use sqlx_core::executor::Executor;
use sqlx_core::query::query;
use sqlx_core::query_as::query_as;
use sqlx_postgres::Postgres;

use bannerhub_storage::{AssociationId, BannerId, StorageError, TagAssociation, TagId, TagSlot};

use crate::error::query_error;

/// Lists a banner's association rows in position order.
///
/// Pass `lock = true` inside a transaction to hold the rows until commit.
pub async fn list<'e, E>(
    executor: E,
    banner_id: BannerId,
    lock: bool,
) -> Result<Vec<TagAssociation>, StorageError>
where
    E: Executor<'e, Database = Postgres>,
{
    let sql = if lock {
        "SELECT id, banner_id, tag_id FROM banner_tag WHERE banner_id = $1 ORDER BY id FOR UPDATE"
    } else {
        "SELECT id, banner_id, tag_id FROM banner_tag WHERE banner_id = $1 ORDER BY id"
    };

    let rows: Vec<(i64, i64, Option<i64>)> = query_as(sql)
        .bind(banner_id)
        .fetch_all(executor)
        .await
        .map_err(|e| query_error("Failed to load tag associations", e))?;

    Ok(rows
        .into_iter()
        .map(|(id, banner_id, tag_id)| TagAssociation {
            id,
            banner_id,
            slot: TagSlot::from(tag_id),
        })
        .collect())
}

pub async fn insert<'e, E>(executor: E, banner_id: BannerId, tag_id: TagId) -> Result<(), StorageError>
where
    E: Executor<'e, Database = Postgres>,
{
    query("INSERT INTO banner_tag (banner_id, tag_id) VALUES ($1, $2)")
        .bind(banner_id)
        .bind(tag_id)
        .execute(executor)
        .await
        .map_err(|e| query_error("Failed to create tag association", e))?;
    Ok(())
}

/// Points an existing association at `slot`; a retired slot stores NULL.
pub async fn overwrite<'e, E>(
    executor: E,
    association_id: AssociationId,
    slot: TagSlot,
) -> Result<(), StorageError>
where
    E: Executor<'e, Database = Postgres>,
{
    let result = query("UPDATE banner_tag SET tag_id = $1 WHERE id = $2")
        .bind(slot.tag_id())
        .bind(association_id)
        .execute(executor)
        .await
        .map_err(|e| query_error("Failed to update tag association", e))?;

    if result.rows_affected() == 0 {
        return Err(StorageError::transaction_error(format!(
            "tag association {association_id} vanished during reconciliation"
        )));
    }
    Ok(())
}

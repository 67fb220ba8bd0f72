//! Banner row queries.

use chrono::{DateTime, Utc};
use sqlx_core::executor::Executor;
use sqlx_core::query::query;
use sqlx_core::query_as::query_as;
use sqlx_core::query_scalar::query_scalar;
use sqlx_postgres::Postgres;
use time::OffsetDateTime;

use bannerhub_storage::{
    Banner, BannerContent, BannerId, FeatureId, NewBanner, StorageError, TagId,
};

use crate::error::query_error;

/// Column list shared by every snapshot query. The trailing aggregate lists
/// active tags in association order.
const SNAPSHOT_COLUMNS: &str = r#"
    b.id, b.feature_id, b.title, b.text, b.url, b.is_active, b.created_at, b.updated_at,
    COALESCE(
        array_agg(bt.tag_id ORDER BY bt.id) FILTER (WHERE bt.tag_id IS NOT NULL),
        '{}'
    ) AS tag_ids
"#;

type SnapshotRow = (
    i64,
    i64,
    String,
    String,
    String,
    bool,
    DateTime<Utc>,
    DateTime<Utc>,
    Vec<i64>,
);

/// Converts chrono DateTime to time OffsetDateTime.
fn chrono_to_time(dt: DateTime<Utc>) -> OffsetDateTime {
    OffsetDateTime::from_unix_timestamp(dt.timestamp()).unwrap_or(OffsetDateTime::UNIX_EPOCH)
        + time::Duration::nanoseconds(i64::from(dt.timestamp_subsec_nanos()))
}

fn into_banner(row: SnapshotRow) -> Banner {
    let (id, feature_id, title, text, url, is_active, created_at, updated_at, tag_ids) = row;
    Banner {
        id,
        feature_id,
        tag_ids,
        content: BannerContent { title, text, url },
        is_active,
        created_at: chrono_to_time(created_at),
        updated_at: chrono_to_time(updated_at),
    }
}

/// Loads the lowest-id active banner bound to `(feature_id, tag_id)`.
pub async fn get_active<'e, E>(
    executor: E,
    feature_id: FeatureId,
    tag_id: TagId,
) -> Result<Option<Banner>, StorageError>
where
    E: Executor<'e, Database = Postgres>,
{
    let sql = format!(
        r#"SELECT {SNAPSHOT_COLUMNS}
           FROM banner b
           LEFT JOIN banner_tag bt ON bt.banner_id = b.id
           WHERE b.id = (
               SELECT b2.id
               FROM banner b2
               JOIN banner_tag t ON t.banner_id = b2.id
               WHERE b2.feature_id = $1 AND t.tag_id = $2 AND b2.is_active
               ORDER BY b2.id
               LIMIT 1
           )
           GROUP BY b.id"#
    );

    let row: Option<SnapshotRow> = query_as(&sql)
        .bind(feature_id)
        .bind(tag_id)
        .fetch_optional(executor)
        .await
        .map_err(|e| query_error("Failed to load active banner", e))?;

    Ok(row.map(into_banner))
}

/// Loads a banner by id.
pub async fn get<'e, E>(executor: E, id: BannerId) -> Result<Option<Banner>, StorageError>
where
    E: Executor<'e, Database = Postgres>,
{
    let sql = format!(
        r#"SELECT {SNAPSHOT_COLUMNS}
           FROM banner b
           LEFT JOIN banner_tag bt ON bt.banner_id = b.id
           WHERE b.id = $1
           GROUP BY b.id"#
    );

    let row: Option<SnapshotRow> = query_as(&sql)
        .bind(id)
        .fetch_optional(executor)
        .await
        .map_err(|e| query_error("Failed to load banner", e))?;

    Ok(row.map(into_banner))
}

/// Inserts the banner row and returns its id.
pub async fn insert<'e, E>(executor: E, banner: &NewBanner) -> Result<BannerId, StorageError>
where
    E: Executor<'e, Database = Postgres>,
{
    query_scalar(
        r#"INSERT INTO banner (feature_id, title, text, url, is_active)
           VALUES ($1, $2, $3, $4, $5)
           RETURNING id"#,
    )
    .bind(banner.feature_id)
    .bind(&banner.content.title)
    .bind(&banner.content.text)
    .bind(&banner.content.url)
    .bind(banner.is_active)
    .fetch_one(executor)
    .await
    .map_err(|e| query_error("Failed to create banner", e))
}

/// Replaces the three content fields.
pub async fn update_content<'e, E>(
    executor: E,
    id: BannerId,
    content: &BannerContent,
) -> Result<(), StorageError>
where
    E: Executor<'e, Database = Postgres>,
{
    let result = query(
        r#"UPDATE banner SET title = $1, text = $2, url = $3, updated_at = now()
           WHERE id = $4"#,
    )
    .bind(&content.title)
    .bind(&content.text)
    .bind(&content.url)
    .bind(id)
    .execute(executor)
    .await
    .map_err(|e| query_error("Failed to update banner content", e))?;

    expect_one(result.rows_affected(), id)
}

pub async fn set_active<'e, E>(executor: E, id: BannerId, is_active: bool) -> Result<(), StorageError>
where
    E: Executor<'e, Database = Postgres>,
{
    let result = query("UPDATE banner SET is_active = $1, updated_at = now() WHERE id = $2")
        .bind(is_active)
        .bind(id)
        .execute(executor)
        .await
        .map_err(|e| query_error("Failed to update banner flag", e))?;

    expect_one(result.rows_affected(), id)
}

pub async fn set_feature<'e, E>(
    executor: E,
    id: BannerId,
    feature_id: FeatureId,
) -> Result<(), StorageError>
where
    E: Executor<'e, Database = Postgres>,
{
    let result = query("UPDATE banner SET feature_id = $1, updated_at = now() WHERE id = $2")
        .bind(feature_id)
        .bind(id)
        .execute(executor)
        .await
        .map_err(|e| query_error("Failed to update banner feature", e))?;

    expect_one(result.rows_affected(), id)
}

/// Bumps `updated_at` and locks the row for the rest of the transaction.
pub async fn touch<'e, E>(executor: E, id: BannerId) -> Result<(), StorageError>
where
    E: Executor<'e, Database = Postgres>,
{
    let result = query("UPDATE banner SET updated_at = now() WHERE id = $1")
        .bind(id)
        .execute(executor)
        .await
        .map_err(|e| query_error("Failed to lock banner", e))?;

    expect_one(result.rows_affected(), id)
}

pub async fn delete<'e, E>(executor: E, id: BannerId) -> Result<(), StorageError>
where
    E: Executor<'e, Database = Postgres>,
{
    let result = query("DELETE FROM banner WHERE id = $1")
        .bind(id)
        .execute(executor)
        .await
        .map_err(|e| query_error("Failed to delete banner", e))?;

    expect_one(result.rows_affected(), id)
}

/// Deletes every listed banner; missing ids are ignored.
pub async fn delete_many<'e, E>(executor: E, ids: &[BannerId]) -> Result<u64, StorageError>
where
    E: Executor<'e, Database = Postgres>,
{
    let result = query("DELETE FROM banner WHERE id = ANY($1)")
        .bind(ids)
        .execute(executor)
        .await
        .map_err(|e| query_error("Failed to delete banners", e))?;

    Ok(result.rows_affected())
}

fn expect_one(rows_affected: u64, id: BannerId) -> Result<(), StorageError> {
    if rows_affected == 0 {
        Err(StorageError::not_found("Banner", id))
    } else {
        Ok(())
    }
}

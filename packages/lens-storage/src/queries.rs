use serde_json::Value;
use time::OffsetDateTime;

use crate::{Result, db::Db, models::ItemRecord};

const ITEM_COLUMNS: &str = "\
item_id,
	width,
	height,
	color,
	raw_key,
	display_key,
	meta,
	caption,
	tags,
	quality_score,
	entities,
	embedding,
	model_version,
	created_at";

/// Batched existence check: returns the subset of `ids` already ingested.
pub async fn filter_existing_ids(db: &Db, ids: &[String]) -> Result<Vec<String>> {
	if ids.is_empty() {
		return Ok(Vec::new());
	}

	let rows: Vec<(String,)> = sqlx::query_as("SELECT item_id FROM items WHERE item_id = ANY($1)")
		.bind(ids)
		.fetch_all(&db.pool)
		.await?;

	Ok(rows.into_iter().map(|(item_id,)| item_id).collect())
}

pub async fn item_exists(db: &Db, item_id: &str) -> Result<bool> {
	let row: Option<(String,)> = sqlx::query_as("SELECT item_id FROM items WHERE item_id = $1")
		.bind(item_id)
		.fetch_optional(&db.pool)
		.await?;

	Ok(row.is_some())
}

pub async fn fetch_item(db: &Db, item_id: &str) -> Result<Option<ItemRecord>> {
	let item = sqlx::query_as(&format!("SELECT {ITEM_COLUMNS} FROM items WHERE item_id = $1"))
		.bind(item_id)
		.fetch_optional(&db.pool)
		.await?;

	Ok(item)
}

pub async fn fetch_items_by_ids(db: &Db, ids: &[String]) -> Result<Vec<ItemRecord>> {
	if ids.is_empty() {
		return Ok(Vec::new());
	}

	let items = sqlx::query_as(&format!("SELECT {ITEM_COLUMNS} FROM items WHERE item_id = ANY($1)"))
		.bind(ids)
		.fetch_all(&db.pool)
		.await?;

	Ok(items)
}

pub async fn latest_items(db: &Db, limit: i64) -> Result<Vec<ItemRecord>> {
	let items = sqlx::query_as(&format!(
		"SELECT {ITEM_COLUMNS} FROM items WHERE caption <> '' ORDER BY created_at DESC LIMIT $1"
	))
	.bind(limit)
	.fetch_all(&db.pool)
	.await?;

	Ok(items)
}

/// Items whose enrichment lags behind the current model version, oldest
/// first, for the evolution refresh batch.
pub async fn stale_model_items(db: &Db, current_version: &str, limit: i64) -> Result<Vec<ItemRecord>> {
	let items = sqlx::query_as(&format!(
		"SELECT {ITEM_COLUMNS} FROM items WHERE model_version <> $1 ORDER BY created_at ASC LIMIT $2"
	))
	.bind(current_version)
	.bind(limit)
	.fetch_all(&db.pool)
	.await?;

	Ok(items)
}

/// Items ingested after `since`, oldest first, for the index-sync pass.
pub async fn items_since(db: &Db, since: OffsetDateTime, limit: i64) -> Result<Vec<ItemRecord>> {
	let items = sqlx::query_as(&format!(
		"SELECT {ITEM_COLUMNS} FROM items WHERE created_at > $1 ORDER BY created_at ASC LIMIT $2"
	))
	.bind(since)
	.bind(limit)
	.fetch_all(&db.pool)
	.await?;

	Ok(items)
}

/// Single atomic upsert. The row never becomes visible half-written; the
/// first ingestion's `created_at` is preserved on re-apply.
pub async fn upsert_item(db: &Db, item: &ItemRecord) -> Result<()> {
	sqlx::query(
		"\
INSERT INTO items (
	item_id,
	width,
	height,
	color,
	raw_key,
	display_key,
	meta,
	caption,
	tags,
	quality_score,
	entities,
	embedding,
	model_version,
	created_at
)
VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
ON CONFLICT (item_id) DO UPDATE
SET
	width = EXCLUDED.width,
	height = EXCLUDED.height,
	color = EXCLUDED.color,
	raw_key = EXCLUDED.raw_key,
	display_key = EXCLUDED.display_key,
	meta = EXCLUDED.meta,
	caption = EXCLUDED.caption,
	tags = EXCLUDED.tags,
	quality_score = EXCLUDED.quality_score,
	entities = EXCLUDED.entities,
	embedding = EXCLUDED.embedding,
	model_version = EXCLUDED.model_version",
	)
	.bind(item.item_id.as_str())
	.bind(item.width)
	.bind(item.height)
	.bind(item.color.as_deref())
	.bind(item.raw_key.as_str())
	.bind(item.display_key.as_str())
	.bind(&item.meta)
	.bind(item.caption.as_str())
	.bind(&item.tags)
	.bind(item.quality_score)
	.bind(&item.entities)
	.bind(&item.embedding)
	.bind(item.model_version.as_str())
	.bind(item.created_at)
	.execute(&db.pool)
	.await?;

	Ok(())
}

/// Overwrites the enrichment fields in place. Used by the refresh path; the
/// asset keys and source metadata are left untouched.
#[allow(clippy::too_many_arguments)]
pub async fn update_enrichment(
	db: &Db,
	item_id: &str,
	caption: &str,
	tags: &Value,
	quality_score: f32,
	entities: &Value,
	embedding: &Value,
	model_version: &str,
) -> Result<()> {
	sqlx::query(
		"\
UPDATE items
SET
	caption = $1,
	tags = $2,
	quality_score = $3,
	entities = $4,
	embedding = $5,
	model_version = $6
WHERE item_id = $7",
	)
	.bind(caption)
	.bind(tags)
	.bind(quality_score)
	.bind(entities)
	.bind(embedding)
	.bind(model_version)
	.bind(item_id)
	.execute(&db.pool)
	.await?;

	Ok(())
}

pub async fn count_items(db: &Db) -> Result<i64> {
	let (count,): (i64,) =
		sqlx::query_as("SELECT COUNT(*) FROM items").fetch_one(&db.pool).await?;

	Ok(count)
}

pub async fn count_items_since(db: &Db, since: OffsetDateTime) -> Result<i64> {
	let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM items WHERE created_at > $1")
		.bind(since)
		.fetch_one(&db.pool)
		.await?;

	Ok(count)
}

use serde_json::Value;
use time::OffsetDateTime;

use crate::{Result, db::Db};

pub const KIND_EXPANSION: &str = "expansion";
pub const KIND_RESPONSE: &str = "response";
pub const KIND_SUGGEST: &str = "suggest";

pub async fn get_cached(db: &Db, cache_key: &str, now: OffsetDateTime) -> Result<Option<Value>> {
	let row: Option<(Value,)> =
		sqlx::query_as("SELECT payload FROM query_cache WHERE cache_key = $1 AND expires_at > $2")
			.bind(cache_key)
			.bind(now)
			.fetch_optional(&db.pool)
			.await?;

	Ok(row.map(|(payload,)| payload))
}

pub async fn put_cached(
	db: &Db,
	cache_key: &str,
	kind: &str,
	payload: &Value,
	expires_at: OffsetDateTime,
) -> Result<()> {
	sqlx::query(
		"\
INSERT INTO query_cache (cache_key, kind, payload, expires_at, created_at)
VALUES ($1, $2, $3, $4, $5)
ON CONFLICT (cache_key) DO UPDATE
SET kind = EXCLUDED.kind, payload = EXCLUDED.payload, expires_at = EXCLUDED.expires_at",
	)
	.bind(cache_key)
	.bind(kind)
	.bind(payload)
	.bind(expires_at)
	.bind(OffsetDateTime::now_utc())
	.execute(&db.pool)
	.await?;

	Ok(())
}

pub async fn purge_expired(db: &Db, now: OffsetDateTime) -> Result<u64> {
	let result = sqlx::query("DELETE FROM query_cache WHERE expires_at <= $1")
		.bind(now)
		.execute(&db.pool)
		.await?;

	Ok(result.rows_affected())
}

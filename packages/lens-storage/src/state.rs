use std::collections::HashMap;

use time::OffsetDateTime;

use crate::{Result, db::Db};

/// SyncState keys. Each key has a single writer per phase; updates are
/// independently idempotent-safe, so no multi-key transaction is needed.
pub const FORWARD_ANCHOR: &str = "forward_anchor";
pub const FORWARD_ANCHOR_TS: &str = "forward_anchor_ts";
pub const BACKFILL_CURSOR: &str = "backfill_cursor";
pub const BACKFILL_DONE: &str = "backfill_done";
pub const LAST_INDEX_SYNC: &str = "last_index_sync";
pub const EVOLUTION_LAST_RUN: &str = "evolution_last_run";

pub fn spend_key(day: time::Date) -> String {
	format!("spend:{:04}-{:02}-{:02}", day.year(), day.month() as u8, day.day())
}

pub async fn get_state(db: &Db, key: &str) -> Result<Option<String>> {
	let row: Option<(String,)> = sqlx::query_as("SELECT value FROM sync_state WHERE key = $1")
		.bind(key)
		.fetch_optional(&db.pool)
		.await?;

	Ok(row.map(|(value,)| value))
}

pub async fn get_states(db: &Db, keys: &[&str]) -> Result<HashMap<String, String>> {
	let owned: Vec<String> = keys.iter().map(|key| key.to_string()).collect();
	let rows: Vec<(String, String)> =
		sqlx::query_as("SELECT key, value FROM sync_state WHERE key = ANY($1)")
			.bind(&owned)
			.fetch_all(&db.pool)
			.await?;

	Ok(rows.into_iter().collect())
}

pub async fn set_state(db: &Db, key: &str, value: &str) -> Result<()> {
	sqlx::query(
		"\
INSERT INTO sync_state (key, value, updated_at)
VALUES ($1, $2, $3)
ON CONFLICT (key) DO UPDATE
SET value = EXCLUDED.value, updated_at = EXCLUDED.updated_at",
	)
	.bind(key)
	.bind(value)
	.bind(OffsetDateTime::now_utc())
	.execute(&db.pool)
	.await?;

	Ok(())
}

/// Adds `amount` to an integer-valued state entry and returns the new total.
pub async fn add_to_counter(db: &Db, key: &str, amount: i64) -> Result<i64> {
	let (total,): (i64,) = sqlx::query_as(
		"\
INSERT INTO sync_state (key, value, updated_at)
VALUES ($1, $2::text, $3)
ON CONFLICT (key) DO UPDATE
SET value = ((sync_state.value)::bigint + $2)::text, updated_at = EXCLUDED.updated_at
RETURNING (value)::bigint",
	)
	.bind(key)
	.bind(amount)
	.bind(OffsetDateTime::now_utc())
	.fetch_one(&db.pool)
	.await?;

	Ok(total)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn spend_key_is_zero_padded() {
		let day = time::Date::from_calendar_date(2026, time::Month::March, 7)
			.expect("invalid test date");

		assert_eq!(spend_key(day), "spend:2026-03-07");
	}
}

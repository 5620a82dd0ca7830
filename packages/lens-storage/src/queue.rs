use sqlx::QueryBuilder;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::{
	Result,
	db::Db,
	models::{IngestTask, NewTask},
};

pub const TASK_NEW_ITEM: &str = "new-item";
pub const TASK_REFRESH_ITEM: &str = "refresh-item";

pub const STATUS_PENDING: &str = "PENDING";
pub const STATUS_FAILED: &str = "FAILED";
pub const STATUS_DONE: &str = "DONE";
pub const STATUS_DEAD: &str = "DEAD";

const BASE_BACKOFF_MS: i64 = 500;
const MAX_BACKOFF_MS: i64 = 30_000;
const MAX_TASK_ERROR_CHARS: usize = 1_024;

/// Submits a batch of tasks in one multi-row insert. Returns the count
/// enqueued. Duplicates against in-flight tasks are not checked here; the
/// workflow's existence check owns that.
pub async fn enqueue_tasks(db: &Db, tasks: &[NewTask]) -> Result<u64> {
	if tasks.is_empty() {
		return Ok(0);
	}

	let now = OffsetDateTime::now_utc();
	let mut builder = QueryBuilder::new(
		"\
INSERT INTO ingest_queue (
	task_id,
	kind,
	item_id,
	payload,
	status,
	available_at,
	created_at,
	updated_at
) ",
	);

	builder.push_values(tasks, |mut b, task| {
		b.push_bind(Uuid::new_v4())
			.push_bind(task.kind.as_str())
			.push_bind(task.item_id.as_str())
			.push_bind(&task.payload)
			.push_bind(STATUS_PENDING)
			.push_bind(now)
			.push_bind(now)
			.push_bind(now);
	});

	let result = builder.build().execute(&db.pool).await?;

	Ok(result.rows_affected())
}

/// Claims the next deliverable task and extends its lease so other consumers
/// skip it until the visibility timeout expires. At-least-once: a consumer
/// that dies mid-task simply lets the lease lapse.
pub async fn claim_next(db: &Db, now: OffsetDateTime, lease_seconds: i64) -> Result<Option<IngestTask>> {
	let mut tx = db.pool.begin().await?;
	let row: Option<IngestTask> = sqlx::query_as(
		"\
SELECT
	task_id,
	kind,
	item_id,
	payload,
	status,
	attempts,
	last_error,
	available_at,
	created_at,
	updated_at
FROM ingest_queue
WHERE status IN ('PENDING','FAILED') AND available_at <= $1
ORDER BY available_at ASC
LIMIT 1
FOR UPDATE SKIP LOCKED",
	)
	.bind(now)
	.fetch_optional(&mut *tx)
	.await?;
	let task = if let Some(mut task) = row {
		let lease_until = now + Duration::seconds(lease_seconds);

		sqlx::query("UPDATE ingest_queue SET available_at = $1, updated_at = $2 WHERE task_id = $3")
			.bind(lease_until)
			.bind(now)
			.bind(task.task_id)
			.execute(&mut *tx)
			.await?;

		task.available_at = lease_until;
		task.updated_at = now;

		Some(task)
	} else {
		None
	};

	tx.commit().await?;

	Ok(task)
}

pub async fn mark_done(db: &Db, task_id: Uuid) -> Result<()> {
	sqlx::query("UPDATE ingest_queue SET status = 'DONE', updated_at = $1 WHERE task_id = $2")
		.bind(OffsetDateTime::now_utc())
		.bind(task_id)
		.execute(&db.pool)
		.await?;

	Ok(())
}

/// Records a delivery failure. The task is redelivered after a backoff until
/// `max_attempts`, then parked as DEAD for inspection.
pub async fn mark_failed(
	db: &Db,
	task_id: Uuid,
	attempts: i32,
	max_attempts: i32,
	error: &str,
) -> Result<()> {
	let next_attempts = attempts.saturating_add(1);
	let now = OffsetDateTime::now_utc();
	let status = if next_attempts >= max_attempts { STATUS_DEAD } else { STATUS_FAILED };
	let available_at = now + backoff_for_attempt(next_attempts);
	let error_text = truncate_error(error);

	sqlx::query(
		"\
UPDATE ingest_queue
SET status = $1,
	attempts = $2,
	last_error = $3,
	available_at = $4,
	updated_at = $5
WHERE task_id = $6",
	)
	.bind(status)
	.bind(next_attempts)
	.bind(error_text)
	.bind(available_at)
	.bind(now)
	.bind(task_id)
	.execute(&db.pool)
	.await?;

	Ok(())
}

pub fn backoff_for_attempt(attempt: i32) -> Duration {
	let attempts = attempt.max(1) as u32;
	let exp = attempts.saturating_sub(1).min(6);
	let base = BASE_BACKOFF_MS.saturating_mul(1 << exp);
	let capped = base.min(MAX_BACKOFF_MS);

	Duration::milliseconds(capped)
}

fn truncate_error(text: &str) -> String {
	let mut out: String = text.chars().take(MAX_TASK_ERROR_CHARS).collect();

	if text.chars().count() > MAX_TASK_ERROR_CHARS {
		out.push_str("...");
	}

	out
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn backoff_grows_and_caps() {
		assert_eq!(backoff_for_attempt(1), Duration::milliseconds(500));
		assert_eq!(backoff_for_attempt(2), Duration::milliseconds(1_000));
		assert_eq!(backoff_for_attempt(4), Duration::milliseconds(4_000));
		assert_eq!(backoff_for_attempt(50), Duration::milliseconds(MAX_BACKOFF_MS));
	}

	#[test]
	fn long_errors_are_truncated() {
		let long = "x".repeat(5_000);
		let stored = truncate_error(&long);

		assert!(stored.len() <= MAX_TASK_ERROR_CHARS + 3);
		assert!(stored.ends_with("..."));
	}
}

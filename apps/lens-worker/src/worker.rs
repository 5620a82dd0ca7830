use std::{sync::Arc, time::Duration as StdDuration};

use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use tokio::time::{self as tokio_time, MissedTickBehavior};

use lens_storage::{
	assets::AssetStore,
	cache,
	db::Db,
	qdrant::{IndexPoint, QdrantStore},
	queries, queue, state,
};

use crate::{Result, crawl, evolution, workflow};

const INDEX_SYNC_BATCH: i64 = 500;

pub struct WorkerState {
	pub cfg: lens_config::Config,
	pub db: Db,
	pub qdrant: QdrantStore,
	pub assets: AssetStore,
}

/// Runs the queue consumers and the scheduler under one runtime. Consumer
/// tasks claim work via leases, so a second worker process against the same
/// database is safe.
pub async fn run_worker(state: Arc<WorkerState>) -> Result<()> {
	for worker_id in 0..state.cfg.worker.concurrency {
		let state = state.clone();

		tokio::spawn(async move { consume_loop(state, worker_id).await });
	}

	scheduler_loop(state).await
}

async fn consume_loop(state: Arc<WorkerState>, worker_id: u32) {
	let poll_interval = StdDuration::from_millis(state.cfg.worker.poll_interval_ms);

	loop {
		match process_next_task(&state).await {
			Ok(true) => {},
			Ok(false) => tokio_time::sleep(poll_interval).await,
			Err(err) => {
				tracing::error!(error = %err, worker_id, "Queue poll failed.");

				tokio_time::sleep(poll_interval).await;
			},
		}
	}
}

/// Claims and processes one task. A task failure never aborts the consumer;
/// it is recorded on the task for redelivery (or dead-lettering) and the
/// loop moves on.
async fn process_next_task(state: &WorkerState) -> Result<bool> {
	let now = OffsetDateTime::now_utc();
	let Some(task) =
		queue::claim_next(&state.db, now, state.cfg.worker.lease_seconds).await?
	else {
		return Ok(false);
	};

	match workflow::process_task(state, &task).await {
		Ok(()) => queue::mark_done(&state.db, task.task_id).await?,
		Err(err) => {
			tracing::error!(
				error = %err,
				task_id = %task.task_id,
				item_id = %task.item_id,
				kind = %task.kind,
				"Ingest task failed."
			);
			queue::mark_failed(
				&state.db,
				task.task_id,
				task.attempts,
				state.cfg.worker.max_task_attempts,
				&err.to_string(),
			)
			.await?;
		},
	}

	Ok(true)
}

async fn scheduler_loop(state: Arc<WorkerState>) -> Result<()> {
	let mut crawl_tick =
		tokio_time::interval(StdDuration::from_secs(state.cfg.ingest.interval_seconds));
	let mut housekeeping_tick = tokio_time::interval(StdDuration::from_secs(
		state.cfg.worker.index_sync_interval_seconds.max(1) as u64,
	));

	crawl_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
	housekeeping_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

	loop {
		tokio::select! {
			_ = crawl_tick.tick() => {
				if let Err(err) = crawl::run_cycle(&state).await {
					tracing::error!(error = %err, "Crawl cycle failed.");
				}
				if let Err(err) = evolution::run_if_due(&state).await {
					tracing::error!(error = %err, "Evolution cycle skipped.");
				}
			},
			_ = housekeeping_tick.tick() => {
				if let Err(err) = sync_index_once(&state).await {
					tracing::error!(error = %err, "Index sync failed.");
				}
				if let Err(err) = purge_expired_cache(&state.db).await {
					tracing::error!(error = %err, "Query cache cleanup failed.");
				}
			},
		}
	}
}

/// Repairs index gaps left by crashes between persist and index: re-upserts
/// every item ingested after the `last_index_sync` watermark, then advances
/// the watermark. Only this pass writes that key.
async fn sync_index_once(state: &WorkerState) -> Result<()> {
	let since = match state::get_state(&state.db, state::LAST_INDEX_SYNC).await? {
		Some(raw) => OffsetDateTime::parse(&raw, &Rfc3339).unwrap_or(OffsetDateTime::UNIX_EPOCH),
		None => OffsetDateTime::UNIX_EPOCH,
	};
	let items = queries::items_since(&state.db, since, INDEX_SYNC_BATCH).await?;

	if items.is_empty() {
		return Ok(());
	}

	let mut points = Vec::with_capacity(items.len());
	let mut newest = since;

	for item in &items {
		let vector = item.embedding_vec();

		if item.created_at > newest {
			newest = item.created_at;
		}
		if vector.is_empty() {
			continue;
		}

		points.push(IndexPoint {
			item_id: item.item_id.clone(),
			vector,
			display_key: item.display_key.clone(),
			caption: item.caption.clone(),
		});
	}

	state.qdrant.upsert_items(&points).await?;

	if let Ok(stamp) = newest.format(&Rfc3339) {
		state::set_state(&state.db, state::LAST_INDEX_SYNC, &stamp).await?;
	}

	tracing::info!(count = points.len(), "Index sync pass completed.");

	Ok(())
}

async fn purge_expired_cache(db: &Db) -> Result<()> {
	let purged = cache::purge_expired(db, OffsetDateTime::now_utc()).await?;

	if purged > 0 {
		tracing::info!(count = purged, "Purged expired query cache entries.");
	}

	Ok(())
}

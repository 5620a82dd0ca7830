use std::collections::HashSet;

use time::{OffsetDateTime, format_description::well_known::Rfc3339};

use lens_providers::feed::{self, FeedItem, FeedOrder};
use lens_storage::{
	models::NewTask,
	queries, queue, state,
};

use crate::{Result, worker::WorkerState};

/// One synchronization cycle: forward catch-up against the feed head, then
/// backward backfill with whatever quota is left. Each phase owns its own
/// SyncState keys and a failure in one never blocks the other.
pub async fn run_cycle(state: &WorkerState) -> Result<()> {
	let keys = state::get_states(&state.db, &[
		state::FORWARD_ANCHOR,
		state::BACKFILL_CURSOR,
		state::BACKFILL_DONE,
		state::FORWARD_ANCHOR_TS,
	])
	.await?;
	let anchor = keys.get(state::FORWARD_ANCHOR).cloned().unwrap_or_default();
	let mut remaining = None;

	match forward_catch_up(state, &anchor).await {
		Ok(left) => remaining = Some(left),
		Err(err) => tracing::error!(error = %err, "Forward catch-up aborted."),
	}

	let backfill_done = keys.get(state::BACKFILL_DONE).map(String::as_str) == Some("true");

	if state.cfg.ingest.backfill_enabled
		&& !backfill_done
		&& remaining.is_none_or(|left| left > state.cfg.ingest.quota_floor)
	{
		let cursor = keys
			.get(state::BACKFILL_CURSOR)
			.and_then(|raw| raw.parse().ok())
			.unwrap_or(1);
		let anchor_ts = keys.get(state::FORWARD_ANCHOR_TS).and_then(|raw| parse_feed_ts(raw));

		if let Err(err) = backfill(state, cursor, anchor_ts).await {
			tracing::error!(error = %err, "Backfill aborted.");
		}
	}

	Ok(())
}

/// Pages the `latest` view newest-first, hunting for the anchor. Items ahead
/// of the anchor are new; the anchor only advances once their enqueue has
/// returned success. When the anchor is not found within the bounded scan
/// (cold start, upstream deletion, long outage) everything seen is enqueued
/// and the anchor still advances - dedup absorbs any overlap.
async fn forward_catch_up(state: &WorkerState, anchor: &str) -> Result<u32> {
	let cfg = &state.cfg.ingest;
	let mut remaining = 0;
	let mut candidate_anchor: Option<FeedItem> = None;

	for page in 1..=cfg.max_forward_pages {
		let feed_page = feed::fetch_page(&state.cfg.feed, FeedOrder::Latest, page).await?;

		remaining = feed_page.remaining;

		if feed_page.items.is_empty() {
			break;
		}

		let real: Vec<FeedItem> =
			feed_page.items.into_iter().filter(|item| !item.is_promoted()).collect();

		if real.is_empty() {
			continue;
		}
		if page == 1 && real[0].id != anchor {
			candidate_anchor = Some(real[0].clone());
		}

		if let Some(index) = anchor_index(&real, anchor) {
			if index > 0 {
				filter_and_enqueue(state, &real[..index]).await?;
			}

			advance_anchor(state, candidate_anchor).await?;
			tracing::info!(page, "Anchor found. Forward catch-up complete.");

			return Ok(remaining);
		}

		filter_and_enqueue(state, &real).await?;

		if remaining <= cfg.quota_floor {
			tracing::info!(remaining, "Quota floor reached during forward catch-up.");

			break;
		}
	}

	advance_anchor(state, candidate_anchor).await?;

	Ok(remaining)
}

/// Strategy: walk the feed's `oldest` view forward on a stable page counter.
/// New items land at the head of the `latest` view, so `oldest` page N means
/// the same items on every cycle and pagination drift cannot occur. Backfill
/// is complete once a page's newest timestamp reaches the forward watermark.
async fn backfill(
	state: &WorkerState,
	cursor: u32,
	anchor_ts: Option<OffsetDateTime>,
) -> Result<()> {
	let cfg = &state.cfg.ingest;
	let mut page = cursor.max(1);
	let mut pages_done = 0;

	while pages_done < cfg.backfill_max_pages {
		let feed_page = feed::fetch_page(&state.cfg.feed, FeedOrder::Oldest, page).await?;

		if feed_page.items.is_empty() {
			state::set_state(&state.db, state::BACKFILL_DONE, "true").await?;
			tracing::info!(page, "Oldest view exhausted. Backfill complete.");

			break;
		}

		filter_and_enqueue(state, &feed_page.items).await?;

		page += 1;
		pages_done += 1;

		state::set_state(&state.db, state::BACKFILL_CURSOR, &page.to_string()).await?;

		if let (Some(anchor_ts), Some(newest)) = (anchor_ts, page_newest_ts(&feed_page.items))
			&& newest >= anchor_ts
		{
			state::set_state(&state.db, state::BACKFILL_DONE, "true").await?;
			tracing::info!(page, "Backfill reached the forward watermark.");

			break;
		}
		if feed_page.remaining <= cfg.quota_floor {
			tracing::info!(remaining = feed_page.remaining, "Quota floor reached during backfill.");

			break;
		}
	}

	Ok(())
}

/// Dedup & enqueue: one batched existence check against the item store, then
/// one batched queue insert for whatever is genuinely new. In-flight queue
/// duplicates are not checked; the workflow's existence check owns that.
pub async fn filter_and_enqueue(state: &WorkerState, items: &[FeedItem]) -> Result<u64> {
	if items.is_empty() {
		return Ok(0);
	}

	let ids: Vec<String> = items.iter().map(|item| item.id.clone()).collect();
	let existing: HashSet<String> =
		queries::filter_existing_ids(&state.db, &ids).await?.into_iter().collect();
	let fresh: Vec<&FeedItem> =
		items.iter().filter(|item| !existing.contains(&item.id)).collect();

	if fresh.is_empty() {
		return Ok(0);
	}

	let mut tasks = Vec::with_capacity(fresh.len());

	for item in &fresh {
		tasks.push(NewTask {
			kind: queue::TASK_NEW_ITEM.to_string(),
			item_id: item.id.clone(),
			payload: serde_json::to_value(item)?,
		});
	}

	let count = queue::enqueue_tasks(&state.db, &tasks).await?;

	tracing::info!(count, "Enqueued fresh items.");

	Ok(count)
}

async fn advance_anchor(state: &WorkerState, candidate: Option<FeedItem>) -> Result<()> {
	let Some(item) = candidate else {
		return Ok(());
	};

	state::set_state(&state.db, state::FORWARD_ANCHOR, &item.id).await?;
	state::set_state(&state.db, state::FORWARD_ANCHOR_TS, &item.created_at).await?;
	tracing::info!(anchor = %item.id, "Forward anchor advanced.");

	Ok(())
}

/// Position of the anchor item on a page already stripped of promoted
/// items. An empty anchor (cold start) never matches.
fn anchor_index(items: &[FeedItem], anchor: &str) -> Option<usize> {
	if anchor.is_empty() {
		return None;
	}

	items.iter().position(|item| item.id == anchor)
}

fn page_newest_ts(items: &[FeedItem]) -> Option<OffsetDateTime> {
	items.iter().filter_map(|item| parse_feed_ts(&item.created_at)).max()
}

fn parse_feed_ts(raw: &str) -> Option<OffsetDateTime> {
	OffsetDateTime::parse(raw, &Rfc3339).ok()
}

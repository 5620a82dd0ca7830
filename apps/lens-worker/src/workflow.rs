use std::time::Duration as StdDuration;

use time::OffsetDateTime;

use lens_domain::{
	embedding_text, model_version_tag,
	vision::{self, VisionAnalysis},
};
use lens_providers::{embedding, feed, feed::FeedItem, vision as vision_provider};
use lens_storage::{
	assets::AssetStore,
	models::{IngestTask, ItemRecord},
	qdrant::IndexPoint,
	queries, queue, state,
};

use crate::{
	Error, Result,
	retry::{RetryPolicy, retry},
	worker::WorkerState,
};

/// New items move slowly but must land: generous attempts, constant delay.
fn new_item_policy() -> RetryPolicy {
	RetryPolicy::fixed(10, StdDuration::from_secs(30))
}

/// Refreshes are low priority and tolerant of delay.
fn refresh_policy() -> RetryPolicy {
	RetryPolicy::exponential(5, StdDuration::from_millis(500), StdDuration::from_secs(30))
}

/// Runs one queued task through the workflow. Steps execute strictly in
/// sequence; every step is idempotent, so a redelivered task (crashed
/// consumer, lapsed lease) re-applies safely.
pub async fn process_task(state: &WorkerState, task: &IngestTask) -> Result<()> {
	match task.kind.as_str() {
		queue::TASK_NEW_ITEM => process_new_item(state, task).await,
		queue::TASK_REFRESH_ITEM => process_refresh_item(state, task).await,
		other => Err(Error::Message(format!("Unsupported task kind: {other}."))),
	}
}

async fn process_new_item(state: &WorkerState, task: &IngestTask) -> Result<()> {
	let policy = new_item_policy();
	let db = &state.db;
	let item_id = task.item_id.as_str();

	// Step 1: existence check. Short-circuits redelivered and doubly
	// enqueued tasks; this is the dedup point the enqueue side leans on.
	let exists =
		retry(&policy, "existence-check", move || queries::item_exists(db, item_id)).await?;

	if exists {
		tracing::info!(item_id = %item_id, "Item already ingested. Skipping.");

		return Ok(());
	}

	let item: FeedItem = serde_json::from_value(task.payload.clone())?;
	let item_ref = &item;

	// Step 2: fetch & store both renditions under deterministic keys.
	retry(&policy, "fetch-assets", move || fetch_and_store_assets(state, item_ref)).await?;

	if let Some(download_location) = item.links.download_location.clone() {
		let feed_cfg = state.cfg.feed.clone();

		tokio::spawn(async move {
			if let Err(err) = feed::track_download(&feed_cfg, &download_location).await {
				tracing::warn!(error = %err, "Download tracking ping failed.");
			}
		});
	}

	// Step 3: analyze. Malformed model output degrades inside the parse;
	// only the call itself is retried.
	let analysis = retry(&policy, "analyze", move || analyze_item(state, item_id)).await?;

	// Step 4: embed the composite text.
	let meta = serde_json::to_value(&item)?;
	let vector = embed_text(state, &policy, &analysis, &meta).await?;

	// Step 5: persist the full record in one atomic upsert. This is where
	// the item becomes visible to search and to existence checks.
	let record = ItemRecord {
		item_id: item_id.to_string(),
		width: item.width,
		height: item.height,
		color: item.color.clone(),
		raw_key: AssetStore::raw_key(item_id),
		display_key: AssetStore::display_key(item_id),
		meta,
		caption: analysis.caption.clone(),
		tags: serde_json::to_value(&analysis.tags)?,
		quality_score: analysis.quality,
		entities: serde_json::to_value(&analysis.entities)?,
		embedding: serde_json::to_value(&vector)?,
		model_version: current_model_version(state),
		created_at: OffsetDateTime::now_utc(),
	};
	let record_ref = &record;

	retry(&policy, "persist", move || queries::upsert_item(db, record_ref)).await?;

	// Step 6: index.
	let point = IndexPoint {
		item_id: item_id.to_string(),
		vector,
		display_key: record.display_key.clone(),
		caption: record.caption.clone(),
	};
	let point_ref = std::slice::from_ref(&point);

	retry(&policy, "index", move || state.qdrant.upsert_items(point_ref)).await?;

	Ok(())
}

/// Re-runs analyze/embed/persist/index against the stored asset and
/// overwrites the enrichment fields in place. Used only by the evolution
/// scheduler; the incurred cost is metered against today's spend.
async fn process_refresh_item(state: &WorkerState, task: &IngestTask) -> Result<()> {
	let policy = refresh_policy();
	let db = &state.db;
	let item_id = task.item_id.as_str();
	let record = retry(&policy, "load-item", move || queries::fetch_item(db, item_id)).await?;
	let Some(record) = record else {
		tracing::warn!(item_id = %item_id, "Refresh task for a missing item. Skipping.");

		return Ok(());
	};
	let analysis = retry(&policy, "analyze", move || analyze_item(state, item_id)).await?;
	let vector = embed_text(state, &policy, &analysis, &record.meta).await?;
	let tags = serde_json::to_value(&analysis.tags)?;
	let entities = serde_json::to_value(&analysis.entities)?;
	let embedding = serde_json::to_value(&vector)?;
	let version = current_model_version(state);
	let caption = analysis.caption.as_str();
	let quality = analysis.quality;
	let (tags_ref, entities_ref, embedding_ref, version_ref) =
		(&tags, &entities, &embedding, version.as_str());

	retry(&policy, "persist", move || {
		queries::update_enrichment(
			db,
			item_id,
			caption,
			tags_ref,
			quality,
			entities_ref,
			embedding_ref,
			version_ref,
		)
	})
	.await?;

	let point = IndexPoint {
		item_id: item_id.to_string(),
		vector,
		display_key: record.display_key.clone(),
		caption: analysis.caption.clone(),
	};
	let point_ref = std::slice::from_ref(&point);

	retry(&policy, "index", move || state.qdrant.upsert_items(point_ref)).await?;

	let spend_key = state::spend_key(OffsetDateTime::now_utc().date());

	if let Err(err) =
		state::add_to_counter(db, &spend_key, state.cfg.evolution.cost_per_item_units).await
	{
		tracing::warn!(error = %err, "Refresh spend metering failed.");
	}

	Ok(())
}

async fn fetch_and_store_assets(state: &WorkerState, item: &FeedItem) -> Result<()> {
	let raw = download(&state.cfg.feed, &item.urls.raw).await?;

	state.assets.put(&AssetStore::raw_key(&item.id), &raw).await?;

	let display = download(&state.cfg.feed, &item.urls.regular).await?;

	state.assets.put(&AssetStore::display_key(&item.id), &display).await?;

	Ok(())
}

async fn analyze_item(state: &WorkerState, item_id: &str) -> Result<VisionAnalysis> {
	let bytes = state.assets.get(&AssetStore::display_key(item_id)).await?;
	let raw = vision_provider::analyze(&state.cfg.providers.vision, &bytes).await?;

	Ok(vision::parse_vision_output(&raw))
}

async fn embed_text(
	state: &WorkerState,
	policy: &RetryPolicy,
	analysis: &VisionAnalysis,
	meta: &serde_json::Value,
) -> Result<Vec<f32>> {
	let texts = vec![embedding_text::build_embedding_text(&analysis.caption, &analysis.tags, meta)];
	let texts_ref = texts.as_slice();
	let embedding_cfg = &state.cfg.providers.embedding;
	let vector = retry(policy, "embed", move || async move {
		let vectors = embedding::embed(embedding_cfg, texts_ref).await?;

		vectors.into_iter().next().ok_or_else(|| lens_providers::Error::InvalidResponse {
			message: "Embedding provider returned no vector.".to_string(),
		})
	})
	.await?;

	if vector.len() != state.qdrant.vector_dim as usize {
		return Err(Error::Message(format!(
			"Embedding dimension {} does not match configured vector_dim {}.",
			vector.len(),
			state.qdrant.vector_dim
		)));
	}

	Ok(vector)
}

async fn download(cfg: &lens_config::Feed, url: &str) -> Result<Vec<u8>> {
	let client =
		reqwest::Client::builder().timeout(StdDuration::from_millis(cfg.timeout_ms)).build()?;
	let bytes = client.get(url).send().await?.error_for_status()?.bytes().await?;

	Ok(bytes.to_vec())
}

fn current_model_version(state: &WorkerState) -> String {
	model_version_tag(&state.cfg.providers.vision.model, &state.cfg.providers.embedding.model)
}

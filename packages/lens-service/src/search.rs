mod cutoff;
mod query_text;
mod rerank_merge;

use std::{collections::HashMap, time::Instant};

use serde_json::Value;
use time::{Duration, OffsetDateTime};

use lens_storage::{cache, db::Db, models::ItemRecord, queries};

use crate::{Error, LensService, Result, suggest};

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SearchRequest {
	pub query: String,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ImageResult {
	pub id: String,
	pub url: String,
	pub width: i32,
	pub height: i32,
	pub caption: String,
	pub tags: Vec<String>,
	pub score: Option<f32>,
	pub photographer: Option<String>,
	pub color: Option<String>,
	pub location: Option<String>,
	pub description: Option<String>,
	pub topics: Vec<String>,
	pub entities: Vec<String>,
	pub quality_score: f32,
	pub model_version: String,
}

/// Stable shape, serialized verbatim into the response cache.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SearchResponse {
	pub results: Vec<ImageResult>,
	pub total: usize,
	pub took_ms: u64,
}

impl LensService {
	/// Runs the full ranking pipeline: expansion, query embedding, vector
	/// search, dynamic cutoff, record fetch, re-rank, merge.
	///
	/// Expansion, caching, and re-ranking degrade to the best available
	/// ordering on failure; only the vector query and the record fetch can
	/// fail the request.
	pub async fn search(&self, req: SearchRequest) -> Result<SearchResponse> {
		let start = Instant::now();
		let normalized = query_text::normalize_query(&req.query);

		if normalized.is_empty() {
			return Err(Error::InvalidRequest { message: "Query must be non-empty.".to_string() });
		}

		let now = OffsetDateTime::now_utc();
		let response_key = query_text::response_cache_key(&normalized);

		if self.cfg.search.cache.enabled {
			match cache::get_cached(&self.db, &response_key, now).await {
				Ok(Some(payload)) => match serde_json::from_value::<SearchResponse>(payload) {
					Ok(response) => return Ok(response),
					Err(err) => {
						tracing::warn!(error = %err, "Cached search response failed to decode.")
					},
				},
				Ok(None) => {},
				Err(err) => tracing::warn!(error = %err, "Search response cache read failed."),
			}
		}

		let expanded = self.expand_query(&normalized).await;
		let vectors = self
			.providers
			.embedding
			.embed(&self.cfg.providers.embedding, std::slice::from_ref(&expanded))
			.await?;
		let vector = vectors.into_iter().next().ok_or_else(|| Error::Provider {
			message: "Embedding provider returned no vector.".to_string(),
		})?;
		let hits = self.qdrant.search(vector, self.cfg.search.candidate_k).await?;

		if hits.is_empty() {
			return Ok(SearchResponse {
				results: Vec::new(),
				total: 0,
				took_ms: start.elapsed().as_millis() as u64,
			});
		}

		let scores: Vec<f32> = hits.iter().map(|hit| hit.score).collect();
		let keep =
			cutoff::dynamic_cutoff(&scores, self.cfg.search.cutoff_decay, self.cfg.search.cutoff_floor);
		let hits = &hits[..keep];
		let ids: Vec<String> = hits.iter().map(|hit| hit.item_id.clone()).collect();
		let records = queries::fetch_items_by_ids(&self.db, &ids).await?;
		let by_id: HashMap<&str, &ItemRecord> =
			records.iter().map(|record| (record.item_id.as_str(), record)).collect();
		let mut candidates: Vec<(ItemRecord, f32)> = Vec::with_capacity(hits.len());

		for hit in hits {
			let Some(record) = by_id.get(hit.item_id.as_str()) else {
				tracing::warn!(item_id = %hit.item_id, "Indexed item is missing from the store.");

				continue;
			};

			candidates.push(((*record).clone(), hit.score));
		}

		let head = (self.cfg.search.rerank.top_n as usize).min(candidates.len());
		let mut order: Vec<usize> = (0..candidates.len()).collect();
		let mut reranked_head = 0;

		if head > 1 {
			let docs: Vec<String> =
				candidates[..head].iter().map(|(record, _)| record.caption.clone()).collect();

			match self.providers.rerank.rerank(&self.cfg.providers.rerank, &expanded, &docs).await {
				Ok(entries) => match rerank_merge::rerank_order(
					candidates.len(),
					head,
					&entries,
					self.cfg.search.rerank.min_usable as usize,
				) {
					Some(merged) => {
						order = merged;
						reranked_head = head;
					},
					None => tracing::warn!(
						"Re-rank returned too few usable rankings. Keeping vector order."
					),
				},
				Err(err) => tracing::warn!(error = %err, "Re-rank failed. Keeping vector order."),
			}
		}

		let results: Vec<ImageResult> = order
			.iter()
			.enumerate()
			.map(|(position, &index)| {
				let (record, vector_score) = &candidates[index];

				to_image_result(
					record,
					Some(rerank_merge::display_score(position, reranked_head, *vector_score)),
				)
			})
			.collect();
		let response =
			SearchResponse { total: results.len(), results, took_ms: start.elapsed().as_millis() as u64 };

		if self.cfg.search.cache.enabled {
			self.spawn_response_cache_write(&response_key, &response);
		}
		if !response.results.is_empty() {
			self.spawn_suggestion_record(&normalized);
		}

		Ok(response)
	}

	async fn expand_query(&self, normalized: &str) -> String {
		if !query_text::should_expand(normalized, self.cfg.search.expansion.max_words) {
			return normalized.to_string();
		}

		let cfg = &self.cfg.providers.expansion;
		let key =
			query_text::expansion_cache_key(normalized, &cfg.provider_id, &cfg.model, cfg.temperature);

		if self.cfg.search.cache.enabled {
			match cache::get_cached(&self.db, &key, OffsetDateTime::now_utc()).await {
				Ok(Some(payload)) =>
					if let Some(text) = payload.as_str() {
						return text.to_string();
					},
				Ok(None) => {},
				Err(err) => tracing::warn!(error = %err, "Expansion cache read failed."),
			}
		}

		match self.providers.expansion.expand(cfg, normalized).await {
			Ok(expanded) => {
				if self.cfg.search.cache.enabled && expanded != normalized {
					let pool = self.db.pool.clone();
					let ttl = Duration::days(self.cfg.search.expansion.cache_ttl_days);
					let payload = Value::String(expanded.clone());

					tokio::spawn(async move {
						let db = Db { pool };
						let expires_at = OffsetDateTime::now_utc() + ttl;

						if let Err(err) =
							cache::put_cached(&db, &key, cache::KIND_EXPANSION, &payload, expires_at)
								.await
						{
							tracing::warn!(error = %err, "Expansion cache write failed.");
						}
					});
				}

				expanded
			},
			Err(err) => {
				tracing::warn!(error = %err, "Query expansion failed. Using the original query.");

				normalized.to_string()
			},
		}
	}

	fn spawn_response_cache_write(&self, response_key: &str, response: &SearchResponse) {
		let payload = match serde_json::to_value(response) {
			Ok(payload) => payload,
			Err(err) => {
				tracing::warn!(error = %err, "Search response failed to encode for caching.");

				return;
			},
		};
		let pool = self.db.pool.clone();
		let key = response_key.to_string();
		let ttl = Duration::minutes(self.cfg.search.cache.response_ttl_minutes);

		tokio::spawn(async move {
			let db = Db { pool };
			let expires_at = OffsetDateTime::now_utc() + ttl;

			if let Err(err) =
				cache::put_cached(&db, &key, cache::KIND_RESPONSE, &payload, expires_at).await
			{
				tracing::warn!(error = %err, "Search response cache write failed.");
			}
		});
	}

	fn spawn_suggestion_record(&self, normalized: &str) {
		let pool = self.db.pool.clone();
		let query = normalized.to_string();
		let ttl_days = self.cfg.search.cache.suggest_ttl_days;

		tokio::spawn(async move {
			let db = Db { pool };

			if let Err(err) = suggest::record_suggestion(&db, &query, ttl_days).await {
				tracing::warn!(error = %err, "Suggestion index update failed.");
			}
		});
	}
}

pub(crate) fn to_image_result(record: &ItemRecord, score: Option<f32>) -> ImageResult {
	let meta = &record.meta;
	let topics = meta
		.get("topic_submissions")
		.and_then(Value::as_object)
		.map(|topics| topics.keys().cloned().collect())
		.unwrap_or_default();

	ImageResult {
		id: record.item_id.clone(),
		url: record.display_key.clone(),
		width: record.width,
		height: record.height,
		caption: record.caption.clone(),
		tags: record.tag_list(),
		score,
		photographer: meta_str(meta, "/user/name"),
		color: record.color.clone(),
		location: meta_str(meta, "/location/name"),
		description: meta_str(meta, "/description"),
		topics,
		entities: record.entity_list(),
		quality_score: record.quality_score,
		model_version: record.model_version.clone(),
	}
}

fn meta_str(meta: &Value, pointer: &str) -> Option<String> {
	meta.pointer(pointer)
		.and_then(Value::as_str)
		.map(str::trim)
		.filter(|text| !text.is_empty())
		.map(str::to_string)
}

#[cfg(test)]
mod tests {
	use super::*;

	fn record() -> ItemRecord {
		ItemRecord {
			item_id: "abc123".to_string(),
			width: 4_000,
			height: 3_000,
			color: Some("#262626".to_string()),
			raw_key: "raw/abc123.jpg".to_string(),
			display_key: "display/abc123.jpg".to_string(),
			meta: serde_json::json!({
				"user": { "name": "John" },
				"location": { "name": "Reine" },
				"description": "Golden hour",
				"topic_submissions": { "nature": {} },
			}),
			caption: "A fjord at dusk".to_string(),
			tags: serde_json::json!(["fjord", "dusk"]),
			quality_score: 7.5,
			entities: serde_json::json!(["Reine"]),
			embedding: serde_json::json!([0.1, 0.2]),
			model_version: "vision-a+embed-a".to_string(),
			created_at: OffsetDateTime::UNIX_EPOCH,
		}
	}

	#[test]
	fn image_result_pulls_optional_fields_from_meta() {
		let result = to_image_result(&record(), Some(0.9));

		assert_eq!(result.id, "abc123");
		assert_eq!(result.url, "display/abc123.jpg");
		assert_eq!(result.photographer.as_deref(), Some("John"));
		assert_eq!(result.location.as_deref(), Some("Reine"));
		assert_eq!(result.topics, vec!["nature"]);
		assert_eq!(result.tags, vec!["fjord", "dusk"]);
		assert_eq!(result.score, Some(0.9));
	}

	#[test]
	fn missing_meta_fields_stay_absent() {
		let mut record = record();

		record.meta = serde_json::json!({});

		let result = to_image_result(&record, Some(0.5));

		assert_eq!(result.photographer, None);
		assert_eq!(result.location, None);
		assert_eq!(result.description, None);
		assert!(result.topics.is_empty());
	}

	#[test]
	fn search_response_round_trips_through_json() {
		let response = SearchResponse {
			results: vec![to_image_result(&record(), Some(1.0))],
			total: 1,
			took_ms: 12,
		};
		let payload = serde_json::to_value(&response).expect("encode failed");
		let decoded: SearchResponse = serde_json::from_value(payload).expect("decode failed");

		assert_eq!(decoded.total, 1);
		assert_eq!(decoded.results[0].id, "abc123");
	}
}

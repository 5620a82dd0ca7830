use std::time::Duration;

use reqwest::Client;
use serde_json::Value;

use crate::{Error, Result};

/// One usable ranking from the re-rank model: a candidate index (into the
/// submitted document list) and its relevance score.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RerankEntry {
	pub index: usize,
	pub score: f32,
}

pub async fn rerank(
	cfg: &lens_config::ProviderConfig,
	query: &str,
	docs: &[String],
) -> Result<Vec<RerankEntry>> {
	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let url = format!("{}{}", cfg.api_base, cfg.path);
	let body = serde_json::json!({ "model": cfg.model, "query": query, "documents": docs });
	let res = client
		.post(url)
		.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
		.json(&body)
		.send()
		.await?;
	let json: Value = res.error_for_status()?.json().await?;

	parse_rerank_response(json, docs.len())
}

/// Keeps whatever entries are structurally valid and in range; the caller
/// decides whether enough survived to act on.
fn parse_rerank_response(json: Value, doc_count: usize) -> Result<Vec<RerankEntry>> {
	let results = json
		.get("results")
		.or_else(|| json.get("data"))
		.and_then(Value::as_array)
		.ok_or_else(|| Error::InvalidResponse {
			message: "Rerank response is missing results array.".to_string(),
		})?;
	let mut entries = Vec::with_capacity(results.len());

	for item in results {
		let Some(index) = item
			.get("index")
			.or_else(|| item.get("id"))
			.and_then(Value::as_u64)
			.map(|value| value as usize)
		else {
			continue;
		};
		let Some(score) = item
			.get("relevance_score")
			.or_else(|| item.get("score"))
			.and_then(Value::as_f64)
			.map(|value| value as f32)
		else {
			continue;
		};

		if index < doc_count {
			entries.push(RerankEntry { index, score });
		}
	}

	Ok(entries)
}

use serde_json::Value;
use time::{Duration, OffsetDateTime};

use lens_storage::{cache, db::Db};

use crate::{LensService, Result};

const MIN_QUERY_CHARS: usize = 2;
const MAX_ENTRIES_PER_PREFIX: usize = 50;
const MAX_SUGGESTIONS: usize = 8;

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SuggestResponse {
	pub suggestions: Vec<String>,
}

impl LensService {
	pub async fn suggest(&self, query: &str) -> Result<SuggestResponse> {
		let normalized = normalize(query);
		let Some(key) = suggest_key(&normalized) else {
			return Ok(SuggestResponse { suggestions: Vec::new() });
		};
		let entries = match cache::get_cached(&self.db, &key, OffsetDateTime::now_utc()).await {
			Ok(Some(payload)) => decode_entries(payload),
			Ok(None) => Vec::new(),
			Err(err) => {
				tracing::warn!(error = %err, "Suggestion index read failed.");

				Vec::new()
			},
		};

		Ok(SuggestResponse { suggestions: filter_entries(&entries, &normalized, MAX_SUGGESTIONS) })
	}
}

/// Appends a successful query to its prefix bucket, FIFO-capped. Runs off
/// the response path; the caller logs failures.
pub async fn record_suggestion(db: &Db, normalized: &str, ttl_days: i64) -> lens_storage::Result<()> {
	let Some(key) = suggest_key(normalized) else {
		return Ok(());
	};
	let now = OffsetDateTime::now_utc();
	let mut entries = match cache::get_cached(db, &key, now).await? {
		Some(payload) => decode_entries(payload),
		None => Vec::new(),
	};

	if entries.iter().any(|entry| entry == normalized) {
		return Ok(());
	}

	entries.push(normalized.to_string());

	if entries.len() > MAX_ENTRIES_PER_PREFIX {
		entries.remove(0);
	}

	let payload = serde_json::to_value(&entries)?;

	cache::put_cached(db, &key, cache::KIND_SUGGEST, &payload, now + Duration::days(ttl_days)).await
}

/// Prefix bucket key: first two characters of the normalized query.
pub fn suggest_key(normalized: &str) -> Option<String> {
	if normalized.chars().count() < MIN_QUERY_CHARS {
		return None;
	}

	let prefix: String = normalized.chars().take(2).collect();

	Some(format!("suggest:prefix:{prefix}"))
}

fn filter_entries(entries: &[String], prefix: &str, cap: usize) -> Vec<String> {
	entries.iter().filter(|entry| entry.starts_with(prefix)).take(cap).cloned().collect()
}

fn decode_entries(payload: Value) -> Vec<String> {
	serde_json::from_value(payload).unwrap_or_default()
}

fn normalize(query: &str) -> String {
	query.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn short_queries_have_no_bucket() {
		assert_eq!(suggest_key("a"), None);
		assert_eq!(suggest_key("ab"), Some("suggest:prefix:ab".to_string()));
		assert_eq!(suggest_key("abc def"), Some("suggest:prefix:ab".to_string()));
	}

	#[test]
	fn filter_matches_prefix_and_caps() {
		let entries: Vec<String> =
			(0..20).map(|idx| format!("red something {idx}")).chain(["blue".to_string()]).collect();
		let matches = filter_entries(&entries, "red", 8);

		assert_eq!(matches.len(), 8);
		assert!(matches.iter().all(|entry| entry.starts_with("red")));
	}
}

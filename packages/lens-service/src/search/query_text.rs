const EXPANSION_CACHE_SCHEMA_VERSION: i32 = 1;
const RESPONSE_CACHE_SCHEMA_VERSION: i32 = 1;

/// Lowercased, trimmed, single-spaced form used for every cache key.
pub fn normalize_query(raw: &str) -> String {
	raw.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

/// Only short queries are worth expanding; longer ones already carry enough
/// signal and the extra model call just adds latency.
pub fn should_expand(normalized: &str, max_words: u32) -> bool {
	let words = normalized.split_whitespace().count();

	words > 0 && words <= max_words as usize
}

pub fn expansion_cache_key(
	normalized: &str,
	provider_id: &str,
	model: &str,
	temperature: f32,
) -> String {
	let payload = serde_json::json!({
		"kind": "expansion",
		"schema_version": EXPANSION_CACHE_SCHEMA_VERSION,
		"query": normalized,
		"provider_id": provider_id,
		"model": model,
		"temperature": temperature,
	});

	hash_cache_key(&payload)
}

pub fn response_cache_key(normalized: &str) -> String {
	let payload = serde_json::json!({
		"kind": "response",
		"schema_version": RESPONSE_CACHE_SCHEMA_VERSION,
		"query": normalized,
	});

	hash_cache_key(&payload)
}

fn hash_cache_key(payload: &serde_json::Value) -> String {
	let raw = payload.to_string();

	blake3::hash(raw.as_bytes()).to_hex().to_string()
}

use std::time::Duration;

use reqwest::Client;
use serde_json::Value;

use crate::Result;

const EXPANSION_PROMPT: &str = "Expand this image search query with related visual terms. \
Translate to English if needed. Reply with ONLY the expanded English query. Under 30 words.";

/// Expands a short search query into a richer English phrase using the fast
/// text model. Callers fall back to the original query on any failure.
pub async fn expand(cfg: &lens_config::LlmProviderConfig, query: &str) -> Result<String> {
	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let url = format!("{}{}", cfg.api_base, cfg.path);
	let body = serde_json::json!({
		"model": cfg.model,
		"temperature": cfg.temperature,
		"messages": [{ "role": "user", "content": format!("{EXPANSION_PROMPT}\nQuery: {query}") }],
	});
	let res = client
		.post(url)
		.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
		.json(&body)
		.send()
		.await?;
	let json: Value = res.error_for_status()?.json().await?;
	let expanded = crate::chat_content(&json)?.trim().to_string();

	Ok(if expanded.is_empty() { query.to_string() } else { expanded })
}

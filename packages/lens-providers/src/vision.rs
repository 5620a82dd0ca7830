use std::time::Duration;

use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use reqwest::Client;
use serde_json::Value;

use crate::Result;

const ANALYSIS_PROMPT: &str = "Analyze this photo. Reply with ONLY a JSON object: \
{\"caption\": \"2-3 sentence description\", \"tags\": [\"up to 5 lowercase tags\"], \
\"quality\": 0-10, \"entities\": [\"named people, places or things, if any\"]}";

/// Sends one image to the vision model and returns its raw text reply.
/// Structural parsing of the reply is the caller's concern; the model is not
/// trusted to honor the requested format.
pub async fn analyze(cfg: &lens_config::LlmProviderConfig, image: &[u8]) -> Result<String> {
	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let url = format!("{}{}", cfg.api_base, cfg.path);
	let data_url = format!("data:image/jpeg;base64,{}", BASE64.encode(image));
	let body = serde_json::json!({
		"model": cfg.model,
		"temperature": cfg.temperature,
		"messages": [{
			"role": "user",
			"content": [
				{ "type": "text", "text": ANALYSIS_PROMPT },
				{ "type": "image_url", "image_url": { "url": data_url } },
			],
		}],
	});
	let res = client
		.post(url)
		.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
		.json(&body)
		.send()
		.await?;
	let json: Value = res.error_for_status()?.json().await?;

	crate::chat_content(&json)
}

use std::time::Duration;

use reqwest::{
	Client, StatusCode,
	header::{HeaderMap, HeaderValue},
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{Error, Result};

const RATELIMIT_REMAINING_HEADER: &str = "x-ratelimit-remaining";

/// Paginated read order exposed by the feed.
///
/// `Latest` shifts under head insertions; `Oldest` is stable and is what the
/// backfill walk relies on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FeedOrder {
	Latest,
	Oldest,
}
impl FeedOrder {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Latest => "latest",
			Self::Oldest => "oldest",
		}
	}
}

/// One feed item, typed on the handful of fields the pipeline reads.
/// Everything else rides along in `extra` so the stored metadata snapshot
/// keeps the full upstream payload.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct FeedItem {
	pub id: String,
	pub created_at: String,
	#[serde(default)]
	pub promoted_at: Option<String>,
	#[serde(default)]
	pub sponsorship: Option<Value>,
	#[serde(default)]
	pub width: i32,
	#[serde(default)]
	pub height: i32,
	#[serde(default)]
	pub color: Option<String>,
	pub urls: FeedItemUrls,
	#[serde(default)]
	pub links: FeedItemLinks,
	#[serde(flatten)]
	pub extra: Map<String, Value>,
}
impl FeedItem {
	/// Promoted/sponsored items are pinned to the top of the `latest` view
	/// and would break index-based boundary detection.
	pub fn is_promoted(&self) -> bool {
		self.sponsorship.as_ref().is_some_and(|value| !value.is_null())
	}
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct FeedItemUrls {
	pub raw: String,
	pub regular: String,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct FeedItemLinks {
	#[serde(default)]
	pub download_location: Option<String>,
}

/// One page of the feed plus the remaining-quota signal the feed attaches
/// to every response.
#[derive(Clone, Debug)]
pub struct FeedPage {
	pub items: Vec<FeedItem>,
	pub remaining: u32,
}

pub async fn fetch_page(cfg: &lens_config::Feed, order: FeedOrder, page: u32) -> Result<FeedPage> {
	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let url = format!(
		"{}/photos?order_by={}&per_page={}&page={}",
		cfg.api_base,
		order.as_str(),
		cfg.page_size,
		page
	);
	let mut headers = HeaderMap::new();

	headers.insert(reqwest::header::AUTHORIZATION, format!("Client-ID {}", cfg.access_key).parse()?);
	headers.insert("Accept-Version", HeaderValue::from_static("v1"));

	let res = client.get(url).headers(headers).send().await?;

	if res.status() == StatusCode::FORBIDDEN {
		return Err(Error::RateLimited);
	}

	let remaining = parse_remaining(res.headers());
	let items: Vec<FeedItem> = res.error_for_status()?.json().await?;

	Ok(FeedPage { items, remaining })
}

/// Notifies the feed that an item's asset was downloaded. The feed requires
/// this ping for attribution accounting; failures are the caller's to log.
pub async fn track_download(cfg: &lens_config::Feed, download_location: &str) -> Result<()> {
	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let sep = if download_location.contains('?') { '&' } else { '?' };
	let url = format!("{download_location}{sep}client_id={}", cfg.access_key);

	client.get(url).send().await?.error_for_status()?;

	Ok(())
}

fn parse_remaining(headers: &HeaderMap) -> u32 {
	headers
		.get(RATELIMIT_REMAINING_HEADER)
		.and_then(|value| value.to_str().ok())
		.and_then(|value| value.trim().parse().ok())
		.unwrap_or(0)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_remaining_header_and_defaults_to_zero() {
		let mut headers = HeaderMap::new();

		headers.insert(RATELIMIT_REMAINING_HEADER, HeaderValue::from_static("37"));

		assert_eq!(parse_remaining(&headers), 37);
		assert_eq!(parse_remaining(&HeaderMap::new()), 0);
	}

	#[test]
	fn item_keeps_unknown_fields_in_extra() {
		let raw = serde_json::json!({
			"id": "abc123",
			"created_at": "2024-05-01T10:00:00Z",
			"urls": { "raw": "https://img/raw", "regular": "https://img/regular" },
			"user": { "name": "John" },
			"likes": 12,
		});
		let item: FeedItem = serde_json::from_value(raw).expect("parse failed");

		assert_eq!(item.id, "abc123");
		assert_eq!(item.extra.get("likes"), Some(&serde_json::json!(12)));
		assert_eq!(
			item.extra.get("user").and_then(|user| user.get("name")),
			Some(&serde_json::json!("John"))
		);
	}

	#[test]
	fn sponsorship_marks_item_promoted() {
		let raw = serde_json::json!({
			"id": "abc123",
			"created_at": "2024-05-01T10:00:00Z",
			"sponsorship": { "sponsor": { "id": "brand" } },
			"urls": { "raw": "r", "regular": "d" },
		});
		let item: FeedItem = serde_json::from_value(raw).expect("parse failed");

		assert!(item.is_promoted());

		let raw = serde_json::json!({
			"id": "def456",
			"created_at": "2024-05-01T10:00:00Z",
			"sponsorship": null,
			"urls": { "raw": "r", "regular": "d" },
		});
		let item: FeedItem = serde_json::from_value(raw).expect("parse failed");

		assert!(!item.is_promoted());
	}
}

use regex::Regex;
use serde::Deserialize;

pub const MAX_CAPTION_CHARS: usize = 1_000;
pub const MAX_TAGS: usize = 15;
pub const MAX_ENTITIES: usize = 15;
pub const DEFAULT_QUALITY: f32 = 5.0;

/// Parsed output of the vision analysis model.
#[derive(Clone, Debug, PartialEq)]
pub struct VisionAnalysis {
	pub caption: String,
	pub tags: Vec<String>,
	pub quality: f32,
	pub entities: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct VisionContract {
	caption: String,
	#[serde(default)]
	tags: Vec<String>,
	#[serde(default)]
	quality: Option<f32>,
	#[serde(default)]
	entities: Vec<String>,
}

/// Parses the raw text a vision model returned for one image.
///
/// The model is asked for a JSON object but is not trusted to produce one:
/// a JSON body that passes the contract wins, a `Description:`/`Tags:` line
/// layout is extracted next, and anything else degrades to the leading text
/// as caption with default enrichment so a malformed response never blocks
/// ingestion.
pub fn parse_vision_output(raw: &str) -> VisionAnalysis {
	let text = raw.trim();

	if let Some(parsed) = parse_contract_json(text) {
		return parsed;
	}
	if let Some(parsed) = parse_line_layout(text) {
		return parsed;
	}

	degraded(text)
}

fn parse_contract_json(text: &str) -> Option<VisionAnalysis> {
	let body = extract_json_object(text)?;
	let contract: VisionContract = serde_json::from_str(body).ok()?;
	let caption = truncate_chars(contract.caption.trim(), MAX_CAPTION_CHARS);

	if caption.is_empty() {
		return None;
	}

	Some(VisionAnalysis {
		caption,
		tags: clean_list(contract.tags, MAX_TAGS),
		quality: clamp_quality(contract.quality),
		entities: clean_list(contract.entities, MAX_ENTITIES),
	})
}

fn parse_line_layout(text: &str) -> Option<VisionAnalysis> {
	let caption_re = Regex::new(r"(?is)Description:\s*(.+?)(?:\n|Tags:|$)").ok()?;
	let tags_re = Regex::new(r"(?i)Tags:\s*(.+)").ok()?;
	let quality_re = Regex::new(r"(?i)Quality:\s*([0-9]+(?:\.[0-9]+)?)").ok()?;
	let entities_re = Regex::new(r"(?i)Entities:\s*(.+)").ok()?;
	let caption = caption_re.captures(text)?.get(1)?.as_str().trim().to_string();

	if caption.is_empty() {
		return None;
	}

	let tags = tags_re
		.captures(text)
		.and_then(|caps| caps.get(1))
		.map(|m| split_list(m.as_str(), MAX_TAGS))
		.unwrap_or_default();
	let entities = entities_re
		.captures(text)
		.and_then(|caps| caps.get(1))
		.map(|m| split_list(m.as_str(), MAX_ENTITIES))
		.unwrap_or_default();
	let quality = quality_re
		.captures(text)
		.and_then(|caps| caps.get(1))
		.and_then(|m| m.as_str().parse::<f32>().ok());

	Some(VisionAnalysis {
		caption: truncate_chars(&caption, MAX_CAPTION_CHARS),
		tags,
		quality: clamp_quality(quality),
		entities,
	})
}

fn degraded(text: &str) -> VisionAnalysis {
	let caption = text.lines().next().unwrap_or_default().trim();

	VisionAnalysis {
		caption: truncate_chars(caption, MAX_CAPTION_CHARS),
		tags: Vec::new(),
		quality: DEFAULT_QUALITY,
		entities: Vec::new(),
	}
}

fn extract_json_object(text: &str) -> Option<&str> {
	let start = text.find('{')?;
	let end = text.rfind('}')?;

	if end <= start {
		return None;
	}

	Some(&text[start..=end])
}

fn clamp_quality(quality: Option<f32>) -> f32 {
	match quality {
		Some(value) if value.is_finite() => value.clamp(0.0, 10.0),
		_ => DEFAULT_QUALITY,
	}
}

fn clean_list(values: Vec<String>, cap: usize) -> Vec<String> {
	values
		.into_iter()
		.map(|value| value.trim().to_lowercase())
		.filter(|value| !value.is_empty())
		.take(cap)
		.collect()
}

fn split_list(raw: &str, cap: usize) -> Vec<String> {
	raw.split(',').map(|part| part.trim().to_lowercase()).filter(|part| !part.is_empty()).take(cap).collect()
}

fn truncate_chars(text: &str, cap: usize) -> String {
	text.chars().take(cap).collect()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_contract_json() {
		let raw = r#"Here you go: {"caption": "A red fox in snow", "tags": ["Fox", "snow"], "quality": 8, "entities": ["fox"]}"#;
		let parsed = parse_vision_output(raw);

		assert_eq!(parsed.caption, "A red fox in snow");
		assert_eq!(parsed.tags, vec!["fox", "snow"]);
		assert_eq!(parsed.quality, 8.0);
		assert_eq!(parsed.entities, vec!["fox"]);
	}

	#[test]
	fn parses_line_layout() {
		let raw = "Description: A quiet harbor at dusk.\nTags: harbor, dusk, boats\nQuality: 6\nEntities: harbor";
		let parsed = parse_vision_output(raw);

		assert_eq!(parsed.caption, "A quiet harbor at dusk.");
		assert_eq!(parsed.tags, vec!["harbor", "dusk", "boats"]);
		assert_eq!(parsed.quality, 6.0);
		assert_eq!(parsed.entities, vec!["harbor"]);
	}

	#[test]
	fn malformed_output_degrades_instead_of_failing() {
		let raw = "The model rambled on\nwithout any structure at all";
		let parsed = parse_vision_output(raw);

		assert_eq!(parsed.caption, "The model rambled on");
		assert!(parsed.tags.is_empty());
		assert!(parsed.entities.is_empty());
		assert_eq!(parsed.quality, DEFAULT_QUALITY);
	}

	#[test]
	fn quality_is_clamped_and_defaulted() {
		let raw = r#"{"caption": "Over the top quality", "quality": 99}"#;

		assert_eq!(parse_vision_output(raw).quality, 10.0);

		let raw = r#"{"caption": "No quality at all"}"#;

		assert_eq!(parse_vision_output(raw).quality, DEFAULT_QUALITY);
	}

	#[test]
	fn tag_list_is_capped_and_lowercased() {
		let tags: Vec<String> = (0..30).map(|idx| format!("Tag{idx}")).collect();
		let raw = serde_json::json!({ "caption": "Plenty of tags", "tags": tags }).to_string();
		let parsed = parse_vision_output(&raw);

		assert_eq!(parsed.tags.len(), MAX_TAGS);
		assert_eq!(parsed.tags[0], "tag0");
	}
}

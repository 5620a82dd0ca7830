use serde_json::Value;

/// Builds the composite text an item is embedded under.
///
/// Optional source-metadata fields are appended only when present; an absent
/// field contributes no segment, so two items with different metadata shapes
/// still produce clean ` | `-joined text.
pub fn build_embedding_text(caption: &str, tags: &[String], meta: &Value) -> String {
	let mut parts = vec![caption.to_string()];

	if !tags.is_empty() {
		parts.push(format!("Tags: {}", tags.join(", ")));
	}
	if let Some(alt) = non_empty_str(meta.get("alt_description")) {
		parts.push(alt.to_string());
	}
	if let Some(description) = non_empty_str(meta.get("description")) {
		parts.push(description.to_string());
	}
	if let Some(name) = non_empty_str(meta.pointer("/user/name")) {
		parts.push(format!("Photographer: {name}"));
	}
	if let Some(location) = non_empty_str(meta.pointer("/location/name")) {
		parts.push(format!("Location: {location}"));
	}
	if let Some(topics) = meta.get("topic_submissions").and_then(Value::as_object)
		&& !topics.is_empty()
	{
		let names: Vec<&str> = topics.keys().map(String::as_str).collect();

		parts.push(format!("Topics: {}", names.join(", ")));
	}

	parts.join(" | ")
}

fn non_empty_str(value: Option<&Value>) -> Option<&str> {
	value.and_then(Value::as_str).map(str::trim).filter(|text| !text.is_empty())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn joins_present_fields_and_omits_absent_ones() {
		let meta = serde_json::json!({ "user": { "name": "John" } });
		let tags = vec!["cute".to_string(), "animal".to_string()];

		assert_eq!(
			build_embedding_text("A cat", &tags, &meta),
			"A cat | Tags: cute, animal | Photographer: John"
		);
	}

	#[test]
	fn caption_alone_when_metadata_is_empty() {
		assert_eq!(build_embedding_text("A cat", &[], &serde_json::json!({})), "A cat");
	}

	#[test]
	fn includes_location_and_topics() {
		let meta = serde_json::json!({
			"description": "Golden hour",
			"location": { "name": "Reine, Norway" },
			"topic_submissions": { "nature": { "status": "approved" }, "travel": {} },
		});
		let text = build_embedding_text("Fjord view", &[], &meta);

		assert_eq!(text, "Fjord view | Golden hour | Location: Reine, Norway | Topics: nature, travel");
	}

	#[test]
	fn blank_metadata_strings_are_treated_as_absent() {
		let meta = serde_json::json!({ "alt_description": "  ", "user": { "name": "" } });

		assert_eq!(build_embedding_text("A cat", &[], &meta), "A cat");
	}
}

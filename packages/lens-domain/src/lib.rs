pub mod embedding_text;
pub mod vision;

/// Enrichment-model version tag stored on every ItemRecord. Items whose tag
/// differs from the current one are candidates for the evolution refresh.
pub fn model_version_tag(vision_model: &str, embedding_model: &str) -> String {
	format!("{vision_model}+{embedding_model}")
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn version_tag_changes_with_either_model() {
		let base = model_version_tag("vision-a", "embed-a");

		assert_ne!(base, model_version_tag("vision-b", "embed-a"));
		assert_ne!(base, model_version_tag("vision-a", "embed-b"));
	}
}

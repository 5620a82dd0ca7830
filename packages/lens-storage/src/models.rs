use serde_json::Value;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ItemRecord {
	pub item_id: String,
	pub width: i32,
	pub height: i32,
	pub color: Option<String>,
	pub raw_key: String,
	pub display_key: String,
	/// Opaque source metadata. The core only reads a few optional fields out
	/// of it when building embedding text.
	pub meta: Value,
	pub caption: String,
	pub tags: Value,
	pub quality_score: f32,
	pub entities: Value,
	pub embedding: Value,
	pub model_version: String,
	pub created_at: OffsetDateTime,
}
impl ItemRecord {
	pub fn tag_list(&self) -> Vec<String> {
		decode_string_list(&self.tags)
	}

	pub fn entity_list(&self) -> Vec<String> {
		decode_string_list(&self.entities)
	}

	pub fn embedding_vec(&self) -> Vec<f32> {
		serde_json::from_value(self.embedding.clone()).unwrap_or_default()
	}
}

#[derive(Debug, sqlx::FromRow)]
pub struct IngestTask {
	pub task_id: Uuid,
	pub kind: String,
	pub item_id: String,
	pub payload: Value,
	pub status: String,
	pub attempts: i32,
	pub last_error: Option<String>,
	pub available_at: OffsetDateTime,
	pub created_at: OffsetDateTime,
	pub updated_at: OffsetDateTime,
}

/// A task not yet submitted to the queue.
#[derive(Debug, Clone)]
pub struct NewTask {
	pub kind: String,
	pub item_id: String,
	pub payload: Value,
}

fn decode_string_list(value: &Value) -> Vec<String> {
	serde_json::from_value(value.clone()).unwrap_or_default()
}

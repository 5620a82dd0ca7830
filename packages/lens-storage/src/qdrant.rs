use std::collections::HashMap;

use qdrant_client::{
	client::Payload,
	qdrant::{
		CreateCollectionBuilder, Distance, PointStruct, Query, QueryPointsBuilder,
		UpsertPointsBuilder, Value, VectorParamsBuilder, value::Kind,
	},
};
use uuid::Uuid;

use crate::Result;

pub struct QdrantStore {
	pub client: qdrant_client::Qdrant,
	pub collection: String,
	pub vector_dim: u32,
}
impl QdrantStore {
	pub fn new(cfg: &lens_config::Qdrant) -> Result<Self> {
		let client = qdrant_client::Qdrant::from_url(&cfg.url).build()?;

		Ok(Self { client, collection: cfg.collection.clone(), vector_dim: cfg.vector_dim })
	}

	pub async fn ensure_collection(&self) -> Result<()> {
		if self.client.collection_exists(&self.collection).await? {
			return Ok(());
		}

		self.client
			.create_collection(
				CreateCollectionBuilder::new(self.collection.clone())
					.vectors_config(VectorParamsBuilder::new(self.vector_dim as u64, Distance::Cosine)),
			)
			.await?;

		Ok(())
	}

	/// Idempotent batched upsert keyed by the derived point ID; re-applying
	/// the same items is a no-op beyond the first write.
	pub async fn upsert_items(&self, points: &[IndexPoint]) -> Result<()> {
		if points.is_empty() {
			return Ok(());
		}

		let mut structs = Vec::with_capacity(points.len());

		for point in points {
			let mut payload_map = HashMap::new();

			payload_map.insert("item_id".to_string(), Value::from(point.item_id.clone()));
			payload_map.insert("display_key".to_string(), Value::from(point.display_key.clone()));
			payload_map.insert("caption".to_string(), Value::from(point.caption.clone()));

			structs.push(PointStruct::new(
				point_id_for(&point.item_id).to_string(),
				point.vector.clone(),
				Payload::from(payload_map),
			));
		}

		let upsert = UpsertPointsBuilder::new(self.collection.clone(), structs).wait(true);

		self.client.upsert_points(upsert).await?;

		Ok(())
	}

	/// Top-K nearest neighbors, best first. Returns external item IDs with
	/// their similarity scores.
	pub async fn search(&self, vector: Vec<f32>, top_k: u32) -> Result<Vec<ScoredItem>> {
		let res = self
			.client
			.query(
				QueryPointsBuilder::new(self.collection.clone())
					.query(Query::new_nearest(vector))
					.limit(top_k as u64)
					.with_payload(true),
			)
			.await?;
		let mut out = Vec::with_capacity(res.result.len());

		for point in res.result {
			let Some(item_id) = payload_string(&point.payload, "item_id") else {
				continue;
			};

			out.push(ScoredItem { item_id, score: point.score });
		}

		Ok(out)
	}
}

#[derive(Debug, Clone)]
pub struct IndexPoint {
	pub item_id: String,
	pub vector: Vec<f32>,
	pub display_key: String,
	pub caption: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoredItem {
	pub item_id: String,
	pub score: f32,
}

/// External feed IDs are opaque strings; the index wants UUID point IDs.
/// Deriving a v5 UUID from the ID keeps the mapping deterministic, which is
/// what makes the index upsert idempotent.
pub fn point_id_for(item_id: &str) -> Uuid {
	Uuid::new_v5(&Uuid::NAMESPACE_OID, item_id.as_bytes())
}

fn payload_string(payload: &HashMap<String, Value>, key: &str) -> Option<String> {
	match payload.get(key)?.kind.as_ref()? {
		Kind::StringValue(value) => Some(value.clone()),
		_ => None,
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn point_ids_are_deterministic_and_distinct() {
		assert_eq!(point_id_for("abc123"), point_id_for("abc123"));
		assert_ne!(point_id_for("abc123"), point_id_for("abc124"));
	}
}

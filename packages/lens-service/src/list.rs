use lens_storage::queries;

use crate::{LensService, Result, search, search::ImageResult};

const DEFAULT_LIMIT: i64 = 100;

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ListResponse {
	pub results: Vec<ImageResult>,
	pub total: usize,
}

impl LensService {
	/// Most recently ingested items with a finished caption, newest first.
	pub async fn latest(&self) -> Result<ListResponse> {
		let records = queries::latest_items(&self.db, DEFAULT_LIMIT).await?;
		let results: Vec<ImageResult> =
			records.iter().map(|record| search::to_image_result(record, None)).collect();

		Ok(ListResponse { total: results.len(), results })
	}
}

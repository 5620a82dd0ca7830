use time::{Duration, OffsetDateTime};

use lens_storage::queries;

use crate::{LensService, Result};

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct StatsResponse {
	pub total: i64,
	pub recent: i64,
}

impl LensService {
	/// Corpus size plus items ingested in the trailing hour.
	pub async fn stats(&self) -> Result<StatsResponse> {
		let total = queries::count_items(&self.db).await?;
		let recent =
			queries::count_items_since(&self.db, OffsetDateTime::now_utc() - Duration::hours(1))
				.await?;

		Ok(StatsResponse { total, recent })
	}
}

use std::sync::Arc;

use lens_service::LensService;
use lens_storage::{db::Db, qdrant::QdrantStore};

#[derive(Clone)]
pub struct AppState {
	pub service: Arc<LensService>,
}
impl AppState {
	pub async fn new(config: lens_config::Config) -> color_eyre::Result<Self> {
		let db = Db::connect(&config.storage.postgres).await?;

		db.ensure_schema().await?;

		let qdrant = QdrantStore::new(&config.storage.qdrant)?;

		qdrant.ensure_collection().await?;

		let service = LensService::new(config, db, qdrant);

		Ok(Self { service: Arc::new(service) })
	}
}

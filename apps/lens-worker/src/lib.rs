pub mod crawl;
pub mod evolution;
pub mod retry;
pub mod worker;
pub mod workflow;

mod error;

pub use error::{Error, Result};

use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use lens_storage::{assets::AssetStore, db::Db, qdrant::QdrantStore};

use crate::worker::WorkerState;

#[derive(Debug, Parser)]
#[command(
	version = lens_cli::VERSION,
	rename_all = "kebab",
	styles = lens_cli::styles(),
)]
pub struct Args {
	#[arg(long, short = 'c', value_name = "FILE")]
	pub config: std::path::PathBuf,
}

pub async fn run(args: Args) -> color_eyre::Result<()> {
	let config = lens_config::load(&args.config)?;
	let filter =
		EnvFilter::try_new(&config.service.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

	tracing_subscriber::fmt().with_env_filter(filter).init();

	let db = Db::connect(&config.storage.postgres).await?;

	db.ensure_schema().await?;

	let qdrant = QdrantStore::new(&config.storage.qdrant)?;

	qdrant.ensure_collection().await?;

	let assets = AssetStore::new(&config.storage.assets);
	let state = Arc::new(WorkerState { cfg: config, db, qdrant, assets });

	worker::run_worker(state).await?;

	Ok(())
}

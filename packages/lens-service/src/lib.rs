pub mod list;
pub mod search;
pub mod stats;
pub mod suggest;

mod error;

pub use error::{Error, Result};
pub use list::ListResponse;
pub use search::{ImageResult, SearchRequest, SearchResponse};
pub use stats::StatsResponse;
pub use suggest::SuggestResponse;

use std::{future::Future, pin::Pin, sync::Arc};

use lens_config::{Config, EmbeddingProviderConfig, LlmProviderConfig, ProviderConfig};
use lens_providers::{embedding, expansion, rerank, rerank::RerankEntry};
use lens_storage::{db::Db, qdrant::QdrantStore};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub trait EmbeddingProvider
where
	Self: Send + Sync,
{
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, lens_providers::Result<Vec<Vec<f32>>>>;
}

pub trait ExpansionProvider
where
	Self: Send + Sync,
{
	fn expand<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		query: &'a str,
	) -> BoxFuture<'a, lens_providers::Result<String>>;
}

pub trait RerankProvider
where
	Self: Send + Sync,
{
	fn rerank<'a>(
		&'a self,
		cfg: &'a ProviderConfig,
		query: &'a str,
		docs: &'a [String],
	) -> BoxFuture<'a, lens_providers::Result<Vec<RerankEntry>>>;
}

#[derive(Clone)]
pub struct Providers {
	pub embedding: Arc<dyn EmbeddingProvider>,
	pub expansion: Arc<dyn ExpansionProvider>,
	pub rerank: Arc<dyn RerankProvider>,
}
impl Providers {
	pub fn new(
		embedding: Arc<dyn EmbeddingProvider>,
		expansion: Arc<dyn ExpansionProvider>,
		rerank: Arc<dyn RerankProvider>,
	) -> Self {
		Self { embedding, expansion, rerank }
	}
}
impl Default for Providers {
	fn default() -> Self {
		let provider = Arc::new(DefaultProviders);

		Self { embedding: provider.clone(), expansion: provider.clone(), rerank: provider }
	}
}

pub struct LensService {
	pub cfg: Config,
	pub db: Db,
	pub qdrant: QdrantStore,
	pub providers: Providers,
}
impl LensService {
	pub fn new(cfg: Config, db: Db, qdrant: QdrantStore) -> Self {
		Self { cfg, db, qdrant, providers: Providers::default() }
	}

	pub fn with_providers(cfg: Config, db: Db, qdrant: QdrantStore, providers: Providers) -> Self {
		Self { cfg, db, qdrant, providers }
	}
}

struct DefaultProviders;

impl EmbeddingProvider for DefaultProviders {
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, lens_providers::Result<Vec<Vec<f32>>>> {
		Box::pin(embedding::embed(cfg, texts))
	}
}

impl ExpansionProvider for DefaultProviders {
	fn expand<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		query: &'a str,
	) -> BoxFuture<'a, lens_providers::Result<String>> {
		Box::pin(expansion::expand(cfg, query))
	}
}

impl RerankProvider for DefaultProviders {
	fn rerank<'a>(
		&'a self,
		cfg: &'a ProviderConfig,
		query: &'a str,
		docs: &'a [String],
	) -> BoxFuture<'a, lens_providers::Result<Vec<RerankEntry>>> {
		Box::pin(rerank::rerank(cfg, query, docs))
	}
}

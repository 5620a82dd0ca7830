use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Deserialize)]
pub struct Config {
	pub service: Service,
	pub storage: Storage,
	pub feed: Feed,
	pub ingest: Ingest,
	pub evolution: Evolution,
	pub worker: Worker,
	pub providers: Providers,
	pub search: Search,
}

#[derive(Debug, Deserialize)]
pub struct Service {
	pub http_bind: String,
	pub log_level: String,
}

#[derive(Debug, Deserialize)]
pub struct Storage {
	pub postgres: Postgres,
	pub qdrant: Qdrant,
	pub assets: Assets,
}

#[derive(Debug, Deserialize)]
pub struct Postgres {
	pub dsn: String,
	pub pool_max_conns: u32,
}

#[derive(Debug, Deserialize)]
pub struct Qdrant {
	pub url: String,
	pub collection: String,
	pub vector_dim: u32,
}

#[derive(Debug, Deserialize)]
pub struct Assets {
	pub root: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Feed {
	pub api_base: String,
	pub access_key: String,
	pub page_size: u32,
	pub timeout_ms: u64,
}

#[derive(Debug, Deserialize)]
pub struct Ingest {
	pub interval_seconds: u64,
	pub max_forward_pages: u32,
	/// Remaining-quota level at which a cycle stops paging and leaves the
	/// rest of the window for the next cycle.
	pub quota_floor: u32,
	pub backfill_enabled: bool,
	pub backfill_max_pages: u32,
}

#[derive(Debug, Deserialize)]
pub struct Evolution {
	/// "HH:MM" UTC. The daily refresh batch is considered after this time.
	pub trigger_utc: String,
	pub daily_ceiling_units: i64,
	pub reserve_units: i64,
	pub cost_per_item_units: i64,
	pub batch_cap: u32,
}

#[derive(Debug, Deserialize)]
pub struct Worker {
	pub concurrency: u32,
	pub poll_interval_ms: u64,
	pub lease_seconds: i64,
	pub max_task_attempts: i32,
	pub index_sync_interval_seconds: i64,
}

#[derive(Debug, Deserialize)]
pub struct Providers {
	pub vision: LlmProviderConfig,
	pub embedding: EmbeddingProviderConfig,
	pub expansion: LlmProviderConfig,
	pub rerank: ProviderConfig,
}

#[derive(Debug, Deserialize)]
pub struct EmbeddingProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub dimensions: u32,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
pub struct ProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
pub struct LlmProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub temperature: f32,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
pub struct Search {
	pub candidate_k: u32,
	pub cutoff_decay: f32,
	pub cutoff_floor: f32,
	pub expansion: SearchExpansion,
	pub rerank: SearchRerank,
	pub cache: SearchCache,
}

#[derive(Debug, Deserialize)]
pub struct SearchExpansion {
	pub max_words: u32,
	pub cache_ttl_days: i64,
}

#[derive(Debug, Deserialize)]
pub struct SearchRerank {
	pub top_n: u32,
	pub min_usable: u32,
}

#[derive(Debug, Deserialize)]
pub struct SearchCache {
	pub enabled: bool,
	pub response_ttl_minutes: i64,
	pub suggest_ttl_days: i64,
}

use std::sync::{
	Arc,
	atomic::{AtomicUsize, Ordering},
};

use time::OffsetDateTime;

use lens_config::{
	Assets, Config, EmbeddingProviderConfig, Evolution, Feed, Ingest, LlmProviderConfig, Postgres,
	ProviderConfig, Providers, Qdrant, Search, SearchCache, SearchExpansion, SearchRerank,
	Service, Storage, Worker,
};
use lens_providers::rerank::RerankEntry;
use lens_service::{
	BoxFuture, EmbeddingProvider, ExpansionProvider, LensService, RerankProvider, SearchRequest,
};
use lens_storage::{
	db::Db,
	models::ItemRecord,
	qdrant::{IndexPoint, QdrantStore},
	queries,
};
use lens_testkit::TestDatabase;

const DIM: u32 = 4;

struct StubEmbedding;
impl EmbeddingProvider for StubEmbedding {
	fn embed<'a>(
		&'a self,
		_cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, lens_providers::Result<Vec<Vec<f32>>>> {
		let vec = vec![1.0, 0.0, 0.0, 0.0];

		Box::pin(async move { Ok(vec![vec; texts.len()]) })
	}
}

struct SpyExpansion {
	calls: Arc<AtomicUsize>,
}
impl ExpansionProvider for SpyExpansion {
	fn expand<'a>(
		&'a self,
		_cfg: &'a LlmProviderConfig,
		query: &'a str,
	) -> BoxFuture<'a, lens_providers::Result<String>> {
		self.calls.fetch_add(1, Ordering::SeqCst);

		let expanded = format!("{query} with extra visual terms");

		Box::pin(async move { Ok(expanded) })
	}
}

struct FailingRerank;
impl RerankProvider for FailingRerank {
	fn rerank<'a>(
		&'a self,
		_cfg: &'a ProviderConfig,
		_query: &'a str,
		_docs: &'a [String],
	) -> BoxFuture<'a, lens_providers::Result<Vec<RerankEntry>>> {
		Box::pin(async {
			Err(lens_providers::Error::InvalidResponse {
				message: "Rerank response is missing results array.".to_string(),
			})
		})
	}
}

fn provider(model: &str) -> ProviderConfig {
	ProviderConfig {
		provider_id: "test".to_string(),
		api_base: "http://localhost:1".to_string(),
		api_key: "key".to_string(),
		path: "/rerank".to_string(),
		model: model.to_string(),
		timeout_ms: 1_000,
		default_headers: serde_json::Map::new(),
	}
}

fn llm_provider(model: &str) -> LlmProviderConfig {
	LlmProviderConfig {
		provider_id: "test".to_string(),
		api_base: "http://localhost:1".to_string(),
		api_key: "key".to_string(),
		path: "/chat/completions".to_string(),
		model: model.to_string(),
		temperature: 0.2,
		timeout_ms: 1_000,
		default_headers: serde_json::Map::new(),
	}
}

fn test_config(dsn: &str, qdrant_url: &str, collection: &str) -> Config {
	Config {
		service: Service { http_bind: "127.0.0.1:8080".to_string(), log_level: "info".to_string() },
		storage: Storage {
			postgres: Postgres { dsn: dsn.to_string(), pool_max_conns: 2 },
			qdrant: Qdrant {
				url: qdrant_url.to_string(),
				collection: collection.to_string(),
				vector_dim: DIM,
			},
			assets: Assets { root: "/tmp/lens-test-assets".to_string() },
		},
		feed: Feed {
			api_base: "http://localhost:1".to_string(),
			access_key: "key".to_string(),
			page_size: 30,
			timeout_ms: 1_000,
		},
		ingest: Ingest {
			interval_seconds: 600,
			max_forward_pages: 10,
			quota_floor: 1,
			backfill_enabled: true,
			backfill_max_pages: 20,
		},
		evolution: Evolution {
			trigger_utc: "23:00".to_string(),
			daily_ceiling_units: 10_000,
			reserve_units: 1_000,
			cost_per_item_units: 33,
			batch_cap: 500,
		},
		worker: Worker {
			concurrency: 1,
			poll_interval_ms: 100,
			lease_seconds: 30,
			max_task_attempts: 3,
			index_sync_interval_seconds: 900,
		},
		providers: Providers {
			vision: llm_provider("vision-model"),
			embedding: EmbeddingProviderConfig {
				provider_id: "test".to_string(),
				api_base: "http://localhost:1".to_string(),
				api_key: "key".to_string(),
				path: "/embeddings".to_string(),
				model: "embed-model".to_string(),
				dimensions: DIM,
				timeout_ms: 1_000,
				default_headers: serde_json::Map::new(),
			},
			expansion: llm_provider("expand-model"),
			rerank: provider("rerank-model"),
		},
		search: Search {
			candidate_k: 100,
			cutoff_decay: 0.8,
			cutoff_floor: 0.5,
			expansion: SearchExpansion { max_words: 4, cache_ttl_days: 7 },
			rerank: SearchRerank { top_n: 20, min_usable: 3 },
			cache: SearchCache {
				enabled: false,
				response_ttl_minutes: 10,
				suggest_ttl_days: 30,
			},
		},
	}
}

fn item(item_id: &str, caption: &str, embedding: &[f32]) -> ItemRecord {
	ItemRecord {
		item_id: item_id.to_string(),
		width: 400,
		height: 300,
		color: None,
		raw_key: format!("raw/{item_id}.jpg"),
		display_key: format!("display/{item_id}.jpg"),
		meta: serde_json::json!({ "user": { "name": "John" } }),
		caption: caption.to_string(),
		tags: serde_json::json!(["test"]),
		quality_score: 5.0,
		entities: serde_json::json!([]),
		embedding: serde_json::to_value(embedding).expect("encode failed"),
		model_version: "vision-model+embed-model".to_string(),
		created_at: OffsetDateTime::now_utc(),
	}
}

#[tokio::test]
#[ignore = "Requires external Postgres and Qdrant. Set LENS_PG_DSN and LENS_QDRANT_URL to run."]
async fn search_ranks_by_similarity_and_degrades_without_rerank() {
	let Some(base_dsn) = lens_testkit::env_dsn() else {
		eprintln!("Skipping search pipeline test; set LENS_PG_DSN to run this test.");

		return;
	};
	let Some(qdrant_url) = lens_testkit::env_qdrant_url() else {
		eprintln!("Skipping search pipeline test; set LENS_QDRANT_URL to run this test.");

		return;
	};
	let test_db = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
	let collection = test_db.collection_name("lens");
	let cfg = test_config(test_db.dsn(), &qdrant_url, &collection);
	let db = Db::connect(&cfg.storage.postgres).await.expect("Failed to connect to Postgres.");

	db.ensure_schema().await.expect("Failed to ensure schema.");

	let qdrant = QdrantStore::new(&cfg.storage.qdrant).expect("Failed to build Qdrant client.");

	qdrant.ensure_collection().await.expect("Failed to create collection.");

	let seeds = [
		("exact", "An exact match", vec![1.0_f32, 0.0, 0.0, 0.0]),
		("close", "A close match", vec![0.8, 0.6, 0.0, 0.0]),
		("far", "An unrelated item", vec![0.0, 1.0, 0.0, 0.0]),
	];
	let mut points = Vec::new();

	for (id, caption, embedding) in &seeds {
		let record = item(id, caption, embedding);

		queries::upsert_item(&db, &record).await.expect("Failed to seed item.");
		points.push(IndexPoint {
			item_id: id.to_string(),
			vector: embedding.clone(),
			display_key: record.display_key.clone(),
			caption: record.caption.clone(),
		});
	}

	qdrant.upsert_items(&points).await.expect("Failed to seed index.");

	let expansion_calls = Arc::new(AtomicUsize::new(0));
	let providers = lens_service::Providers::new(
		Arc::new(StubEmbedding),
		Arc::new(SpyExpansion { calls: expansion_calls.clone() }),
		Arc::new(FailingRerank),
	);
	let service = LensService::with_providers(cfg, db, qdrant, providers);
	let response = service
		.search(SearchRequest { query: "Sunset".to_string() })
		.await
		.expect("Search failed.");

	// The far item sits below the cutoff floor; the rerank failure leaves
	// vector-similarity order untouched.
	assert_eq!(response.total, 2);
	assert_eq!(response.results[0].id, "exact");
	assert_eq!(response.results[1].id, "close");
	assert_eq!(response.results[0].photographer.as_deref(), Some("John"));
	assert_eq!(expansion_calls.load(Ordering::SeqCst), 1);

	let empty = service.search(SearchRequest { query: "   ".to_string() }).await;

	assert!(empty.is_err());

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

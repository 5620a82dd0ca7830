use time::OffsetDateTime;

use lens_providers::feed::FeedItem;
use lens_storage::{
	assets::AssetStore,
	db::Db,
	models::ItemRecord,
	qdrant::QdrantStore,
	queries,
};
use lens_testkit::TestDatabase;
use lens_worker::{crawl, worker::WorkerState};

fn feed_item(id: &str) -> FeedItem {
	serde_json::from_value(serde_json::json!({
		"id": id,
		"created_at": "2024-05-01T10:00:00Z",
		"urls": { "raw": "http://localhost:1/raw", "regular": "http://localhost:1/regular" },
	}))
	.expect("invalid test item")
}

fn record(item_id: &str) -> ItemRecord {
	ItemRecord {
		item_id: item_id.to_string(),
		width: 100,
		height: 100,
		color: None,
		raw_key: format!("raw/{item_id}.jpg"),
		display_key: format!("display/{item_id}.jpg"),
		meta: serde_json::json!({}),
		caption: "Already here".to_string(),
		tags: serde_json::json!([]),
		quality_score: 5.0,
		entities: serde_json::json!([]),
		embedding: serde_json::json!([]),
		model_version: "v+e".to_string(),
		created_at: OffsetDateTime::now_utc(),
	}
}

fn test_config(dsn: &str) -> lens_config::Config {
	let raw = format!(
		r#"
[service]
http_bind = "127.0.0.1:8080"
log_level = "info"

[storage.postgres]
dsn = "{dsn}"
pool_max_conns = 2

[storage.qdrant]
url = "http://localhost:6334"
collection = "lens_items"
vector_dim = 4

[storage.assets]
root = "/tmp/lens-test-assets"

[feed]
api_base = "http://localhost:1"
access_key = "key"
page_size = 30
timeout_ms = 1000

[ingest]
interval_seconds = 600
max_forward_pages = 10
quota_floor = 1
backfill_enabled = true
backfill_max_pages = 20

[evolution]
trigger_utc = "23:00"
daily_ceiling_units = 10000
reserve_units = 1000
cost_per_item_units = 33
batch_cap = 500

[worker]
concurrency = 1
poll_interval_ms = 100
lease_seconds = 30
max_task_attempts = 3
index_sync_interval_seconds = 900

[providers.vision]
provider_id = "test"
api_base = "http://localhost:1"
api_key = "key"
path = "/chat/completions"
model = "vision-model"
temperature = 0.2
timeout_ms = 1000

[providers.embedding]
provider_id = "test"
api_base = "http://localhost:1"
api_key = "key"
path = "/embeddings"
model = "embed-model"
dimensions = 4
timeout_ms = 1000

[providers.expansion]
provider_id = "test"
api_base = "http://localhost:1"
api_key = "key"
path = "/chat/completions"
model = "expand-model"
temperature = 0.2
timeout_ms = 1000

[providers.rerank]
provider_id = "test"
api_base = "http://localhost:1"
api_key = "key"
path = "/rerank"
model = "rerank-model"
timeout_ms = 1000

[search]
candidate_k = 100
cutoff_decay = 0.8
cutoff_floor = 0.5

[search.expansion]
max_words = 4
cache_ttl_days = 7

[search.rerank]
top_n = 20
min_usable = 3

[search.cache]
enabled = false
response_ttl_minutes = 10
suggest_ttl_days = 30
"#
	);
	let dir = std::env::temp_dir().join(format!("lens-test-{}", std::process::id()));

	std::fs::create_dir_all(&dir).expect("Failed to create temp dir.");

	let path = dir.join("config.toml");

	std::fs::write(&path, raw).expect("Failed to write test config.");

	lens_config::load(&path).expect("Failed to load test config.")
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set LENS_PG_DSN to run."]
async fn enqueue_drops_already_ingested_items_only() {
	let Some(base_dsn) = lens_testkit::env_dsn() else {
		eprintln!("Skipping dedup enqueue test; set LENS_PG_DSN to run this test.");

		return;
	};
	let test_db = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
	let cfg = test_config(test_db.dsn());
	let db = Db::connect(&cfg.storage.postgres).await.expect("Failed to connect to Postgres.");

	db.ensure_schema().await.expect("Failed to ensure schema.");

	let qdrant = QdrantStore::new(&cfg.storage.qdrant).expect("Failed to build Qdrant client.");
	let assets = AssetStore::new(&cfg.storage.assets);
	let state = WorkerState { cfg, db, qdrant, assets };

	queries::upsert_item(&state.db, &record("a")).await.expect("Failed to seed item.");

	// "a" is already mirrored; only "b" is new.
	let enqueued = crawl::filter_and_enqueue(&state, &[feed_item("a"), feed_item("b")])
		.await
		.expect("Enqueue failed.");

	assert_eq!(enqueued, 1);

	// A second pass re-enqueues "b": in-flight queue duplicates are
	// deliberately not checked here, the workflow existence check owns
	// that.
	let again = crawl::filter_and_enqueue(&state, &[feed_item("a"), feed_item("b")])
		.await
		.expect("Enqueue failed.");

	assert_eq!(again, 1);

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

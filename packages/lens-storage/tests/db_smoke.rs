use lens_config::Postgres;
use lens_storage::{db::Db, state};
use lens_testkit::TestDatabase;

#[tokio::test]
#[ignore = "Requires external Postgres. Set LENS_PG_DSN to run."]
async fn db_connects_and_bootstraps() {
	let Some(base_dsn) = lens_testkit::env_dsn() else {
		eprintln!("Skipping db_connects_and_bootstraps; set LENS_PG_DSN to run this test.");

		return;
	};
	let test_db = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
	let cfg = Postgres { dsn: test_db.dsn().to_string(), pool_max_conns: 1 };
	let db = Db::connect(&cfg).await.expect("Failed to connect to Postgres.");

	db.ensure_schema().await.expect("Failed to ensure schema.");
	// Re-running the bootstrap must be a no-op.
	db.ensure_schema().await.expect("Failed to re-run schema bootstrap.");

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set LENS_PG_DSN to run."]
async fn sync_state_round_trips_and_counts() {
	let Some(base_dsn) = lens_testkit::env_dsn() else {
		eprintln!("Skipping sync_state_round_trips_and_counts; set LENS_PG_DSN to run this test.");

		return;
	};
	let test_db = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
	let cfg = Postgres { dsn: test_db.dsn().to_string(), pool_max_conns: 1 };
	let db = Db::connect(&cfg).await.expect("Failed to connect to Postgres.");

	db.ensure_schema().await.expect("Failed to ensure schema.");

	assert_eq!(
		state::get_state(&db, state::FORWARD_ANCHOR).await.expect("Failed to read state."),
		None
	);

	state::set_state(&db, state::FORWARD_ANCHOR, "abc123").await.expect("Failed to set state.");
	state::set_state(&db, state::FORWARD_ANCHOR, "def456").await.expect("Failed to overwrite.");

	assert_eq!(
		state::get_state(&db, state::FORWARD_ANCHOR).await.expect("Failed to read state."),
		Some("def456".to_string())
	);

	let key = state::spend_key(time::OffsetDateTime::now_utc().date());
	let first = state::add_to_counter(&db, &key, 33).await.expect("Failed to add to counter.");
	let second = state::add_to_counter(&db, &key, 33).await.expect("Failed to add to counter.");

	assert_eq!(first, 33);
	assert_eq!(second, 66);

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

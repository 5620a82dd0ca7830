mod error;

pub use error::{Error, Result};

use std::{collections::HashSet, env, str::FromStr, sync::Mutex};

use qdrant_client::Qdrant;
use sqlx::{
	ConnectOptions, Connection, Executor,
	postgres::{PgConnectOptions, PgConnection},
};
use uuid::Uuid;

/// A throwaway Postgres database (plus any Qdrant collections handed out by
/// [`TestDatabase::collection_name`]) for one test. Tests call [`cleanup`]
/// explicitly when done.
///
/// [`cleanup`]: TestDatabase::cleanup
pub struct TestDatabase {
	name: String,
	dsn: String,
	admin_options: PgConnectOptions,
	collections: Mutex<HashSet<String>>,
}
impl TestDatabase {
	pub async fn new(base_dsn: &str) -> Result<Self> {
		let base_options: PgConnectOptions = PgConnectOptions::from_str(base_dsn)
			.map_err(|err| Error::Message(format!("Failed to parse LENS_PG_DSN: {err}.")))?;
		let admin_options = base_options.clone().database("postgres");
		let mut admin_conn = PgConnection::connect_with(&admin_options).await?;
		let name = format!("lens_test_{}", Uuid::new_v4().simple());
		let create_sql = format!(r#"CREATE DATABASE "{}""#, name);

		admin_conn.execute(create_sql.as_str()).await?;
		admin_conn.close().await?;

		let dsn = base_options.database(&name).to_url_lossy().to_string();

		Ok(Self { name, dsn, admin_options, collections: Mutex::new(HashSet::new()) })
	}

	pub fn dsn(&self) -> &str {
		&self.dsn
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	/// Returns a collection name namespaced to this database and remembers
	/// it for cleanup.
	pub fn collection_name(&self, prefix: &str) -> String {
		let collection = format!("{prefix}_{}", self.name);
		let mut tracked = self.collections.lock().unwrap_or_else(|err| err.into_inner());

		tracked.insert(collection.clone());

		collection
	}

	pub async fn cleanup(self) -> Result<()> {
		let collections = {
			let tracked = self.collections.lock().unwrap_or_else(|err| err.into_inner());

			tracked.iter().cloned().collect::<Vec<_>>()
		};
		let mut admin_conn = PgConnection::connect_with(&self.admin_options).await?;
		let drop_sql = format!(r#"DROP DATABASE IF EXISTS "{}" WITH (FORCE)"#, self.name);

		admin_conn.execute(drop_sql.as_str()).await?;
		admin_conn.close().await?;

		if let Some(url) = env_qdrant_url() {
			let client = Qdrant::from_url(&url).build()?;

			for collection in collections {
				let _ = client.delete_collection(collection).await;
			}
		}

		Ok(())
	}
}

pub fn env_dsn() -> Option<String> {
	env::var("LENS_PG_DSN").ok()
}

pub fn env_qdrant_url() -> Option<String> {
	env::var("LENS_QDRANT_URL").ok()
}

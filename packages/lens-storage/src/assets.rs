use std::path::{Path, PathBuf};

use tokio::fs;

use crate::{Error, Result};

/// Filesystem-backed object store for image renditions. Keys are the
/// deterministic `raw/<id>.jpg` / `display/<id>.jpg` paths the workflow
/// derives from the external ID; writes are atomic overwrites, so re-running
/// the fetch step is safe.
pub struct AssetStore {
	root: PathBuf,
}
impl AssetStore {
	pub fn new(cfg: &lens_config::Assets) -> Self {
		Self { root: PathBuf::from(&cfg.root) }
	}

	pub fn raw_key(item_id: &str) -> String {
		format!("raw/{item_id}.jpg")
	}

	pub fn display_key(item_id: &str) -> String {
		format!("display/{item_id}.jpg")
	}

	pub async fn put(&self, key: &str, bytes: &[u8]) -> Result<()> {
		let path = self.resolve(key)?;

		if let Some(parent) = path.parent() {
			fs::create_dir_all(parent).await?;
		}

		// Write-then-rename keeps a concurrent reader from ever observing a
		// partially written asset.
		let tmp = path.with_extension("tmp");

		fs::write(&tmp, bytes).await?;
		fs::rename(&tmp, &path).await?;

		Ok(())
	}

	pub async fn get(&self, key: &str) -> Result<Vec<u8>> {
		let path = self.resolve(key)?;

		match fs::read(&path).await {
			Ok(bytes) => Ok(bytes),
			Err(err) if err.kind() == std::io::ErrorKind::NotFound =>
				Err(Error::NotFound(format!("Asset {key} is missing."))),
			Err(err) => Err(err.into()),
		}
	}

	fn resolve(&self, key: &str) -> Result<PathBuf> {
		let relative = Path::new(key);

		if relative.components().any(|part| matches!(part, std::path::Component::ParentDir))
			|| relative.is_absolute()
		{
			return Err(Error::InvalidArgument(format!("Asset key {key} escapes the store root.")));
		}

		Ok(self.root.join(relative))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn keys_are_derived_from_the_external_id() {
		assert_eq!(AssetStore::raw_key("abc123"), "raw/abc123.jpg");
		assert_eq!(AssetStore::display_key("abc123"), "display/abc123.jpg");
	}

	#[test]
	fn escaping_keys_are_rejected() {
		let store = AssetStore::new(&lens_config::Assets { root: "/tmp/lens".to_string() });

		assert!(store.resolve("../outside.jpg").is_err());
		assert!(store.resolve("/etc/passwd").is_err());
		assert!(store.resolve("raw/ok.jpg").is_ok());
	}
}

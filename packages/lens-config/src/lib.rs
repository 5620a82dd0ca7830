mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Assets, Config, EmbeddingProviderConfig, Evolution, Feed, Ingest, LlmProviderConfig, Postgres,
	ProviderConfig, Providers, Qdrant, Search, SearchCache, SearchExpansion, SearchRerank, Service,
	Storage, Worker,
};

use std::{fs, path::Path};

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.http_bind.trim().is_empty() {
		return Err(Error::Validation {
			message: "service.http_bind must be non-empty.".to_string(),
		});
	}
	if cfg.storage.assets.root.trim().is_empty() {
		return Err(Error::Validation {
			message: "storage.assets.root must be non-empty.".to_string(),
		});
	}
	if cfg.providers.embedding.dimensions == 0 {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must be greater than zero.".to_string(),
		});
	}
	if cfg.providers.embedding.dimensions != cfg.storage.qdrant.vector_dim {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must match storage.qdrant.vector_dim."
				.to_string(),
		});
	}
	if cfg.feed.page_size == 0 {
		return Err(Error::Validation {
			message: "feed.page_size must be greater than zero.".to_string(),
		});
	}
	if cfg.ingest.max_forward_pages == 0 {
		return Err(Error::Validation {
			message: "ingest.max_forward_pages must be greater than zero.".to_string(),
		});
	}
	if parse_trigger_utc(&cfg.evolution.trigger_utc).is_none() {
		return Err(Error::Validation {
			message: "evolution.trigger_utc must be \"HH:MM\" in UTC.".to_string(),
		});
	}
	if cfg.evolution.cost_per_item_units <= 0 {
		return Err(Error::Validation {
			message: "evolution.cost_per_item_units must be greater than zero.".to_string(),
		});
	}
	if cfg.evolution.daily_ceiling_units < 0 {
		return Err(Error::Validation {
			message: "evolution.daily_ceiling_units must be zero or greater.".to_string(),
		});
	}
	if cfg.evolution.reserve_units < 0 {
		return Err(Error::Validation {
			message: "evolution.reserve_units must be zero or greater.".to_string(),
		});
	}
	if cfg.worker.concurrency == 0 {
		return Err(Error::Validation {
			message: "worker.concurrency must be greater than zero.".to_string(),
		});
	}
	if cfg.worker.lease_seconds <= 0 {
		return Err(Error::Validation {
			message: "worker.lease_seconds must be greater than zero.".to_string(),
		});
	}
	if cfg.worker.max_task_attempts <= 0 {
		return Err(Error::Validation {
			message: "worker.max_task_attempts must be greater than zero.".to_string(),
		});
	}
	if cfg.search.candidate_k == 0 {
		return Err(Error::Validation {
			message: "search.candidate_k must be greater than zero.".to_string(),
		});
	}
	if !(cfg.search.cutoff_decay > 0.0 && cfg.search.cutoff_decay <= 1.0) {
		return Err(Error::Validation {
			message: "search.cutoff_decay must be within (0, 1].".to_string(),
		});
	}
	if !(cfg.search.cutoff_floor >= 0.0 && cfg.search.cutoff_floor <= 1.0) {
		return Err(Error::Validation {
			message: "search.cutoff_floor must be within [0, 1].".to_string(),
		});
	}
	if cfg.search.expansion.max_words == 0 {
		return Err(Error::Validation {
			message: "search.expansion.max_words must be greater than zero.".to_string(),
		});
	}
	if cfg.search.expansion.cache_ttl_days <= 0 {
		return Err(Error::Validation {
			message: "search.expansion.cache_ttl_days must be greater than zero.".to_string(),
		});
	}
	if cfg.search.rerank.top_n == 0 {
		return Err(Error::Validation {
			message: "search.rerank.top_n must be greater than zero.".to_string(),
		});
	}
	if cfg.search.rerank.min_usable == 0 {
		return Err(Error::Validation {
			message: "search.rerank.min_usable must be greater than zero.".to_string(),
		});
	}
	if cfg.search.cache.response_ttl_minutes <= 0 {
		return Err(Error::Validation {
			message: "search.cache.response_ttl_minutes must be greater than zero.".to_string(),
		});
	}
	if cfg.search.cache.suggest_ttl_days <= 0 {
		return Err(Error::Validation {
			message: "search.cache.suggest_ttl_days must be greater than zero.".to_string(),
		});
	}

	Ok(())
}

/// Parses "HH:MM" into (hour, minute). Returns `None` on any malformed input.
pub fn parse_trigger_utc(raw: &str) -> Option<(u8, u8)> {
	let (hour, minute) = raw.trim().split_once(':')?;
	let hour: u8 = hour.parse().ok()?;
	let minute: u8 = minute.parse().ok()?;

	if hour > 23 || minute > 59 {
		return None;
	}

	Some((hour, minute))
}

fn normalize(cfg: &mut Config) {
	trim_trailing_slash(&mut cfg.feed.api_base);
	trim_trailing_slash(&mut cfg.providers.vision.api_base);
	trim_trailing_slash(&mut cfg.providers.embedding.api_base);
	trim_trailing_slash(&mut cfg.providers.expansion.api_base);
	trim_trailing_slash(&mut cfg.providers.rerank.api_base);
}

fn trim_trailing_slash(value: &mut String) {
	while value.ends_with('/') {
		value.pop();
	}
}

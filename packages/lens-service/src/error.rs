pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Invalid request: {message}")]
	InvalidRequest { message: String },
	#[error("Not found: {message}")]
	NotFound { message: String },
	#[error("Provider error: {message}")]
	Provider { message: String },
	#[error("Storage error: {message}")]
	Storage { message: String },
	#[error("Vector index error: {message}")]
	Qdrant { message: String },
}
impl From<lens_storage::Error> for Error {
	fn from(err: lens_storage::Error) -> Self {
		match err {
			lens_storage::Error::NotFound(message) => Self::NotFound { message },
			lens_storage::Error::InvalidArgument(message) => Self::InvalidRequest { message },
			lens_storage::Error::Qdrant(inner) => Self::Qdrant { message: inner.to_string() },
			other => Self::Storage { message: other.to_string() },
		}
	}
}

impl From<lens_providers::Error> for Error {
	fn from(err: lens_providers::Error) -> Self {
		Self::Provider { message: err.to_string() }
	}
}

pub mod assets;
pub mod cache;
pub mod db;
pub mod models;
pub mod qdrant;
pub mod queries;
pub mod queue;
pub mod schema;
pub mod state;

mod error;

pub use error::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

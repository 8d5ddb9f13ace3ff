//! Error type for `careers-store-postgres`.

use careers_core::career::WikidataId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] careers_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_postgres::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  /// A stored column held a value outside its enum.
  #[error("cannot decode {column}: {value:?}")]
  Decode { column: &'static str, value: String },

  #[error("career not found: {0}")]
  CareerNotFound(WikidataId),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

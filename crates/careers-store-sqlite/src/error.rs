//! Error type for `careers-store-sqlite`.

use careers_core::career::WikidataId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] careers_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  /// A stored column held a value outside its enum.
  #[error("cannot decode {column}: {value:?}")]
  Decode { column: &'static str, value: String },

  /// A review or traffic update named a career that does not exist.
  #[error("career not found: {0}")]
  CareerNotFound(WikidataId),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

//! Error type for `careers-ingest`.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("http error: {0}")]
  Http(#[from] reqwest::Error),

  #[error("io error: {0}")]
  Io(#[from] std::io::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  /// The career-class cache exists but could not be parsed.
  #[error("malformed career class cache {path}: {source}")]
  ClassCache {
    path:   PathBuf,
    source: serde_json::Error,
  },

  /// Discovery returned nothing to persist.
  #[error("no careers discovered")]
  NoCareersDiscovered,

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  /// Wrap a backend error from any [`CareerStore`](careers_core::store::CareerStore).
  pub fn store<E: std::error::Error + Send + Sync + 'static>(e: E) -> Self {
    Self::Store(Box::new(e))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

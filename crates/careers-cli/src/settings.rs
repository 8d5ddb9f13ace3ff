//! Layered configuration: an optional TOML file, then `CAREERS_*` variables.

use std::{path::{Path, PathBuf}, time::Duration};

use anyhow::Context as _;
use serde::Deserialize;

use careers_ingest::{
  http::DEFAULT_USER_AGENT,
  openverse::DEFAULT_OPENVERSE_API_URL,
  pageviews::{PageviewWindow, DEFAULT_PAGEVIEWS_BASE_URL, DEFAULT_WINDOW_END, DEFAULT_WINDOW_START},
  scheduler::{BatchOptions, DEFAULT_CHUNK_SIZE, DEFAULT_CONCURRENCY},
  wikidata::DEFAULT_SPARQL_ENDPOINT,
  wikipedia::DEFAULT_WIKIPEDIA_API_URL,
};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
  pub database_path:       PathBuf,
  /// A `postgres://` URL selects the PostgreSQL backend.
  pub database_url:        Option<String>,
  pub classes_file:        PathBuf,
  pub user_agent:          String,
  pub concurrency:         usize,
  pub chunk_size:          usize,
  pub pageview_start:      String,
  pub pageview_end:        String,
  pub wikidata_endpoint:   String,
  pub pageviews_base_url:  String,
  pub wikipedia_api_url:   String,
  pub openverse_api_url:   String,
  pub http_timeout_secs:   u64,
  pub sparql_timeout_secs: u64,
}

impl Default for Settings {
  fn default() -> Self {
    Self {
      database_path:       PathBuf::from("careers.db"),
      database_url:        None,
      classes_file:        PathBuf::from("career_classes.json"),
      user_agent:          DEFAULT_USER_AGENT.to_owned(),
      concurrency:         DEFAULT_CONCURRENCY,
      chunk_size:          DEFAULT_CHUNK_SIZE,
      pageview_start:      DEFAULT_WINDOW_START.to_owned(),
      pageview_end:        DEFAULT_WINDOW_END.to_owned(),
      wikidata_endpoint:   DEFAULT_SPARQL_ENDPOINT.to_owned(),
      pageviews_base_url:  DEFAULT_PAGEVIEWS_BASE_URL.to_owned(),
      wikipedia_api_url:   DEFAULT_WIKIPEDIA_API_URL.to_owned(),
      openverse_api_url:   DEFAULT_OPENVERSE_API_URL.to_owned(),
      http_timeout_secs:   30,
      sparql_timeout_secs: 120,
    }
  }
}

/// Which store to open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backend {
  Sqlite(PathBuf),
  Postgres(String),
}

impl Settings {
  /// Read `path` if it exists, then apply `CAREERS_*` environment overrides.
  pub fn load(path: &Path) -> anyhow::Result<Self> {
    config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(config::Environment::with_prefix("CAREERS").try_parsing(true))
      .build()
      .with_context(|| format!("failed to read config file {}", path.display()))?
      .try_deserialize()
      .context("failed to deserialise settings")
  }

  pub fn backend(&self) -> Backend {
    match self.database_url.as_deref() {
      Some(url) if url.starts_with("postgres://") || url.starts_with("postgresql://") => {
        Backend::Postgres(url.to_owned())
      }
      _ => Backend::Sqlite(self.database_path.clone()),
    }
  }

  pub fn batch_options(&self) -> BatchOptions {
    BatchOptions { concurrency: self.concurrency, chunk_size: self.chunk_size }
  }

  pub fn pageview_window(&self) -> PageviewWindow {
    PageviewWindow { start: self.pageview_start.clone(), end: self.pageview_end.clone() }
  }

  pub fn http_timeout(&self) -> Duration { Duration::from_secs(self.http_timeout_secs) }

  pub fn sparql_timeout(&self) -> Duration { Duration::from_secs(self.sparql_timeout_secs) }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn missing_file_gives_defaults() {
    let s = Settings::load(Path::new("/nonexistent/careers-settings.toml")).unwrap();
    assert_eq!(s.concurrency, 50);
    assert_eq!(s.chunk_size, 500);
    assert_eq!(s.pageview_start, "2024010100");
    assert_eq!(s.database_path, PathBuf::from("careers.db"));
  }

  #[test]
  fn file_overrides_defaults() {
    let path = std::env::temp_dir().join(format!("careers-settings-{}.toml", std::process::id()));
    std::fs::write(&path, "concurrency = 8\nclasses_file = \"classes.json\"\n").unwrap();

    let s = Settings::load(&path).unwrap();
    std::fs::remove_file(&path).ok();

    assert_eq!(s.concurrency, 8);
    assert_eq!(s.classes_file, PathBuf::from("classes.json"));
    assert_eq!(s.chunk_size, 500);
    assert_eq!(s.batch_options(), BatchOptions { concurrency: 8, chunk_size: 500 });
  }

  #[test]
  fn backend_follows_url_scheme() {
    let mut s = Settings::default();
    assert_eq!(s.backend(), Backend::Sqlite(PathBuf::from("careers.db")));

    s.database_url = Some("postgresql://u@db/careers".into());
    assert_eq!(s.backend(), Backend::Postgres("postgresql://u@db/careers".into()));

    s.database_url = Some("postgres://u@db/careers".into());
    assert!(matches!(s.backend(), Backend::Postgres(_)));

    s.database_url = Some("sqlite://ignored".into());
    assert_eq!(s.backend(), Backend::Sqlite(PathBuf::from("careers.db")));
  }
}

//! `careers`: operator CLI for the career image review store.
//!
//! # Usage
//!
//! ```text
//! careers fetch --limit 100
//! careers list --status needs_diverse_images
//! careers review Q40348 has_diverse_images --by kim
//! CAREERS_DATABASE_URL=postgres://localhost/careers careers stats
//! ```

mod commands;
mod output;
mod settings;

use std::path::PathBuf;

use anyhow::Context as _;
use clap::Parser;
use careers_store_sqlite::SqliteStore;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use crate::{
  commands::Command,
  settings::{Backend, Settings},
};

#[derive(Parser, Debug)]
#[command(name = "careers", version, about = "Wikipedia career image review tool")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "careers.toml", env = "CAREERS_CONFIG")]
  config: PathBuf,

  #[command(subcommand)]
  command: Command,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();
  let settings = Settings::load(&cli.config)?;

  match settings.backend() {
    Backend::Sqlite(path) => {
      let store = SqliteStore::open(&path)
        .await
        .with_context(|| format!("failed to open store at {}", path.display()))?;
      commands::run(&store, &settings, cli.command).await
    }
    #[cfg(feature = "postgres")]
    Backend::Postgres(url) => {
      let store = careers_store_postgres::PostgresStore::connect(&url)
        .await
        .context("failed to connect to PostgreSQL")?;
      commands::run(&store, &settings, cli.command).await
    }
    #[cfg(not(feature = "postgres"))]
    Backend::Postgres(_) => {
      anyhow::bail!("this build has no PostgreSQL support; rebuild with the `postgres` feature")
    }
  }
}

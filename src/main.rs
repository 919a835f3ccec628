mod app;
mod art;
mod cache;
mod collections;
mod commands;
mod config;
mod connectivity;
mod db;
mod error;
mod offline;
mod platform;
mod prefs;
mod query;
mod render;

use clap::Parser;
use color_eyre::{eyre::eyre, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::art::{ArtApiClient, ArtworkRepository};
use crate::cache::{CacheStorage, NoopStorage, QueryCache, SqliteStorage};
use crate::collections::{ArtworkCollection, CollectionKind};
use crate::connectivity::ConnectivityMonitor;
use crate::db::Database;
use crate::platform::SqliteKv;
use crate::prefs::PreferenceStore;

#[derive(Parser, Debug)]
#[command(name = "artvault")]
#[command(about = "Browse, search and keep artworks from a public art collection")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/artvault/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: commands::Command,
}

/// Log to a file in the data directory; stdout belongs to the commands.
fn init_tracing() -> Result<WorkerGuard> {
  let dir = Database::data_dir()?;
  std::fs::create_dir_all(&dir)
    .map_err(|e| eyre!("Failed to create data directory {}: {}", dir.display(), e))?;

  let appender = tracing_appender::rolling::never(&dir, "artvault.log");
  let (writer, guard) = tracing_appender::non_blocking(appender);
  let filter = EnvFilter::try_from_env("ARTVAULT_LOG").unwrap_or_else(|_| EnvFilter::new("info"));

  tracing_subscriber::registry()
    .with(filter)
    .with(
      tracing_subscriber::fmt::layer()
        .with_writer(writer)
        .with_ansi(false),
    )
    .try_init()
    .map_err(|e| eyre!("Failed to initialize logging: {}", e))?;

  Ok(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();
  let _log_guard = init_tracing()?;

  // Load configuration
  let config = config::Config::load(args.config.as_deref())?;
  debug!("Using API at {}", config.api.base_url);

  let db = Database::open()?;
  let storage: Arc<dyn CacheStorage> = if config.cache.persist {
    Arc::new(SqliteStorage::new(db.clone()))
  } else {
    Arc::new(NoopStorage)
  };
  let cache = QueryCache::new(config.cache.policy(), storage, ConnectivityMonitor::new());
  let _reconnect = cache.spawn_reconnect_listener();

  let api = Arc::new(ArtApiClient::new(&config.api)?);
  let ctx = commands::Context {
    repo: ArtworkRepository::new(api, cache.clone()),
    saved: ArtworkCollection::new(CollectionKind::Saved, db.clone(), cache.clone()),
    disliked: ArtworkCollection::new(CollectionKind::Disliked, db.clone(), cache.clone()),
    prefs: PreferenceStore::new(SqliteKv::new(db)),
    cache,
    config,
  };

  commands::run(args.command, &ctx).await
}

pub mod schema;

use color_eyre::{eyre::eyre, Result};
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::error::ArtError;

/// Shared handle to the on-device SQLite database.
///
/// One connection per process, cloned into every store that needs it.
#[derive(Clone)]
pub struct Database {
  conn: Arc<Mutex<Connection>>,
}

impl Database {
  /// Open or create the database at the default location
  pub fn open() -> Result<Self> {
    Self::open_at(&Self::default_path()?)
  }

  /// Open or create the database at `path`
  pub fn open_at(path: &Path) -> Result<Self> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create database directory: {}", e))?;
    }

    let conn = Connection::open(path)
      .map_err(|e| eyre!("Failed to open database at {}: {}", path.display(), e))?;

    Self::with_connection(conn)
  }

  /// Private in-memory database.
  #[cfg(test)]
  pub fn open_in_memory() -> Result<Self> {
    let conn = Connection::open_in_memory()
      .map_err(|e| eyre!("Failed to open in-memory database: {}", e))?;
    Self::with_connection(conn)
  }

  fn with_connection(conn: Connection) -> Result<Self> {
    let db = Self {
      conn: Arc::new(Mutex::new(conn)),
    };
    db.run_migrations()?;
    Ok(db)
  }

  /// Data directory for the database and the log file
  pub fn data_dir() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("artvault"))
  }

  /// Get the default database path
  fn default_path() -> Result<PathBuf> {
    Ok(Self::data_dir()?.join("artvault.db"))
  }

  /// Run database migrations
  fn run_migrations(&self) -> Result<()> {
    self
      .with_conn(|conn| conn.execute_batch(schema::SCHEMA))
      .map_err(|e| eyre!("Failed to run migrations: {}", e))
  }

  /// Run `f` against the connection, mapping failures to storage errors.
  pub fn with_conn<T>(
    &self,
    f: impl FnOnce(&Connection) -> rusqlite::Result<T>,
  ) -> crate::error::Result<T> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| ArtError::storage(format!("Lock poisoned: {}", e)))?;
    Ok(f(&conn)?)
  }
}

/// Parse a datetime string from SQLite format.
pub fn parse_datetime(s: &str) -> crate::error::Result<chrono::DateTime<chrono::Utc>> {
  // SQLite stores as "YYYY-MM-DD HH:MM:SS"
  chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
    .map(|dt| dt.and_utc())
    .map_err(|e| ArtError::storage(format!("Failed to parse datetime '{}': {}", s, e)))
}

//! Key-value storage on the device.

use rusqlite::{params, OptionalExtension};

use crate::db::Database;
use crate::error::Result;

/// Persistent string records addressed by key.
pub trait KeyValueStore: Send + Sync {
  fn get(&self, key: &str) -> Result<Option<String>>;

  fn set(&self, key: &str, value: &str) -> Result<()>;

  /// Removing an absent key is not an error.
  fn remove(&self, key: &str) -> Result<()>;
}

/// `kv_store` table in the shared database.
#[derive(Clone)]
pub struct SqliteKv {
  db: Database,
}

impl SqliteKv {
  pub fn new(db: Database) -> Self {
    Self { db }
  }
}

impl KeyValueStore for SqliteKv {
  fn get(&self, key: &str) -> Result<Option<String>> {
    self.db.with_conn(|conn| {
      conn
        .query_row("SELECT value FROM kv_store WHERE key = ?", params![key], |row| row.get(0))
        .optional()
    })
  }

  fn set(&self, key: &str, value: &str) -> Result<()> {
    self.db.with_conn(|conn| {
      conn.execute(
        "INSERT OR REPLACE INTO kv_store (key, value, updated_at)
         VALUES (?, ?, datetime('now'))",
        params![key, value],
      )
    })?;
    Ok(())
  }

  fn remove(&self, key: &str) -> Result<()> {
    self
      .db
      .with_conn(|conn| conn.execute("DELETE FROM kv_store WHERE key = ?", params![key]))?;
    Ok(())
  }
}

/// Process-local store for tests.
#[cfg(test)]
pub use memory::MemoryKv;

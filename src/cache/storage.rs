//! Cache storage trait and SQLite implementation.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};
use serde_json::Value;

use crate::db::{parse_datetime, Database};
use crate::error::{ArtError, Result};

/// A query result read back from persistent storage.
#[derive(Debug, Clone)]
pub struct StoredQuery {
  pub data: Value,
  /// When the result was fetched
  pub cached_at: DateTime<Utc>,
}

/// Trait for cache storage backends.
pub trait CacheStorage: Send + Sync {
  /// Store the settled result of a query, replacing any previous one.
  fn store(&self, query_hash: &str, scope: &str, description: &str, data: &Value) -> Result<()>;

  /// Get the persisted result of a query.
  fn load(&self, query_hash: &str) -> Result<Option<StoredQuery>>;

  /// Drop every persisted query.
  fn clear(&self) -> Result<()>;
}

/// Storage implementation that doesn't cache anything.
/// Used when persistence is disabled - all operations are no-ops.
pub struct NoopStorage;

impl CacheStorage for NoopStorage {
  fn store(&self, _hash: &str, _scope: &str, _description: &str, _data: &Value) -> Result<()> {
    Ok(()) // Discard
  }

  fn load(&self, _hash: &str) -> Result<Option<StoredQuery>> {
    Ok(None) // Always miss
  }

  fn clear(&self) -> Result<()> {
    Ok(())
  }
}

/// SQLite-based cache storage implementation.
pub struct SqliteStorage {
  db: Database,
}

impl SqliteStorage {
  pub fn new(db: Database) -> Self {
    Self { db }
  }
}

impl CacheStorage for SqliteStorage {
  fn store(&self, query_hash: &str, scope: &str, description: &str, data: &Value) -> Result<()> {
    let data = serde_json::to_vec(data)
      .map_err(|e| ArtError::storage(format!("Failed to serialize query result: {}", e)))?;

    self.db.with_conn(|conn| {
      conn.execute(
        "INSERT OR REPLACE INTO query_cache (query_hash, scope, description, data, cached_at)
         VALUES (?, ?, ?, ?, datetime('now'))",
        params![query_hash, scope, description, data],
      )
    })?;

    Ok(())
  }

  fn load(&self, query_hash: &str) -> Result<Option<StoredQuery>> {
    let row: Option<(Vec<u8>, String)> = self.db.with_conn(|conn| {
      conn
        .query_row(
          "SELECT data, cached_at FROM query_cache WHERE query_hash = ?",
          params![query_hash],
          |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()
    })?;

    match row {
      Some((data, cached_at_str)) => {
        let data: Value = serde_json::from_slice(&data)
          .map_err(|e| ArtError::storage(format!("Failed to deserialize query result: {}", e)))?;
        let cached_at = parse_datetime(&cached_at_str)?;
        Ok(Some(StoredQuery { data, cached_at }))
      }
      None => Ok(None),
    }
  }

  fn clear(&self) -> Result<()> {
    self
      .db
      .with_conn(|conn| conn.execute("DELETE FROM query_cache", []))?;
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn storage() -> SqliteStorage {
    SqliteStorage::new(Database::open_in_memory().unwrap())
  }

  #[test]
  fn test_store_and_load() {
    let storage = storage();
    let data = json!({"items": [{"id": 1, "title": "Nighthawks"}]});

    storage.store("abc", "artworks", "page 1", &data).unwrap();
    let loaded = storage.load("abc").unwrap().unwrap();

    assert_eq!(loaded.data, data);
    assert!(Utc::now() - loaded.cached_at < chrono::Duration::minutes(1));
  }

  #[test]
  fn test_store_replaces_previous_result() {
    let storage = storage();
    storage.store("abc", "artworks", "page 1", &json!([1])).unwrap();
    storage.store("abc", "artworks", "page 1", &json!([2])).unwrap();

    assert_eq!(storage.load("abc").unwrap().unwrap().data, json!([2]));
  }

  #[test]
  fn test_clear() {
    let storage = storage();
    storage.store("a", "artworks", "a", &json!(1)).unwrap();
    storage.store("b", "search", "b", &json!(2)).unwrap();

    storage.clear().unwrap();
    assert!(storage.load("a").unwrap().is_none());
    assert!(storage.load("b").unwrap().is_none());
  }

  #[test]
  fn test_noop_storage_always_misses() {
    NoopStorage.store("a", "s", "d", &json!(1)).unwrap();
    assert!(NoopStorage.load("a").unwrap().is_none());
  }
}

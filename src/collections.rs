//! Saved and disliked artworks, kept on the device.
//!
//! Each collection stores a snapshot of the artwork so it can be listed
//! without the network. Reads go through the query cache under the
//! collection's key. Writes patch a fresh cached list in place and
//! invalidate it otherwise.

use rusqlite::params;
use tracing::{debug, warn};

use crate::art::keys::ArtQueryKey;
use crate::art::types::Artwork;
use crate::cache::QueryCache;
use crate::db::Database;
use crate::error::{ArtError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollectionKind {
  Saved,
  Disliked,
}

impl CollectionKind {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Saved => "saved",
      Self::Disliked => "disliked",
    }
  }
}

#[derive(Clone)]
pub struct ArtworkCollection {
  kind: CollectionKind,
  db: Database,
  cache: QueryCache,
}

impl ArtworkCollection {
  pub fn new(kind: CollectionKind, db: Database, cache: QueryCache) -> Self {
    Self { kind, db, cache }
  }

  pub fn kind(&self) -> CollectionKind {
    self.kind
  }

  fn key(&self) -> ArtQueryKey {
    ArtQueryKey::Collection(self.kind)
  }

  /// Add an artwork. Adding one that is already present is a no-op.
  ///
  /// Returns whether the artwork was newly added.
  pub fn add(&self, artwork: &Artwork) -> Result<bool> {
    let snapshot = serde_json::to_vec(artwork).map_err(|e| {
      ArtError::storage(format!("Failed to serialize artwork {}: {}", artwork.id, e))
    })?;

    let inserted = self.db.with_conn(|conn| {
      conn.execute(
        "INSERT OR IGNORE INTO collection_items (collection, artwork_id, snapshot)
         VALUES (?, ?, ?)",
        params![self.kind.as_str(), artwork.id as i64, snapshot],
      )
    })?;

    if inserted > 0 {
      debug!("Added artwork {} to {}", artwork.id, self.kind.as_str());
      self.update_cached_list(|items| {
        items.retain(|a| a.id != artwork.id);
        items.insert(0, artwork.clone());
      });
    }
    Ok(inserted > 0)
  }

  /// Remove an artwork. Removing one that is absent is a no-op.
  ///
  /// Returns whether anything was removed.
  pub fn remove(&self, id: u64) -> Result<bool> {
    let removed = self.db.with_conn(|conn| {
      conn.execute(
        "DELETE FROM collection_items WHERE collection = ? AND artwork_id = ?",
        params![self.kind.as_str(), id as i64],
      )
    })?;

    if removed > 0 {
      debug!("Removed artwork {} from {}", id, self.kind.as_str());
      self.update_cached_list(|items| items.retain(|a| a.id != id));
    }
    Ok(removed > 0)
  }

  /// Apply a write to the fresh cached list, or mark the list stale when
  /// there is none to patch.
  fn update_cached_list(&self, edit: impl FnOnce(&mut Vec<Artwork>)) {
    let key = self.key();
    let Some(mut items) = self.cache.get_fresh_query_data::<Vec<Artwork>, _>(&key) else {
      self.cache.invalidate_scope(self.kind.as_str());
      return;
    };
    edit(&mut items);
    if let Err(e) = self.cache.set_query_data(&key, &items) {
      warn!("Failed to update cached {} list: {}", self.kind.as_str(), e);
      self.cache.invalidate_scope(self.kind.as_str());
    }
  }

  /// All artworks in the collection, most recently added first.
  pub async fn list(&self) -> Result<Vec<Artwork>> {
    let db = self.db.clone();
    let kind = self.kind;

    let result = self
      .cache
      .fetch(&self.key(), move || {
        let db = db.clone();
        async move { read_items(&db, kind) }
      })
      .await?;

    // A failing local read is never hidden behind an older snapshot.
    match result.error {
      Some(err) => Err(err),
      None => Ok(result.data),
    }
  }

  /// Membership check. Answers from a fresh cached list when there is one.
  pub async fn contains(&self, id: u64) -> Result<bool> {
    if let Some(items) = self
      .cache
      .get_fresh_query_data::<Vec<Artwork>, _>(&self.key())
    {
      return Ok(items.iter().any(|a| a.id == id));
    }
    Ok(self.list().await?.iter().any(|a| a.id == id))
  }
}

fn read_items(db: &Database, kind: CollectionKind) -> Result<Vec<Artwork>> {
  let rows: Vec<Vec<u8>> = db.with_conn(|conn| {
    let mut stmt = conn.prepare(
      "SELECT snapshot FROM collection_items
       WHERE collection = ?
       ORDER BY added_at DESC, rowid DESC",
    )?;
    let rows = stmt
      .query_map(params![kind.as_str()], |row| row.get(0))?
      .collect::<rusqlite::Result<Vec<Vec<u8>>>>()?;
    Ok(rows)
  })?;

  rows
    .iter()
    .map(|data| {
      serde_json::from_slice(data)
        .map_err(|e| ArtError::storage(format!("Corrupt {} entry: {}", kind.as_str(), e)))
    })
    .collect()
}

//! Core traits and types for the query cache.

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};

use crate::error::ArtError;

/// Values the cache can hold. Entries are kept as JSON so heterogeneous
/// queries share one store and survive a restart through [`CacheStorage`].
///
/// [`CacheStorage`]: super::storage::CacheStorage
pub trait Cacheable: Clone + Send + Sync + Serialize + DeserializeOwned + 'static {}

impl<T> Cacheable for T where T: Clone + Send + Sync + Serialize + DeserializeOwned + 'static {}

/// Identity of a cached query.
pub trait QueryKey: Send + Sync {
  /// Stable, fixed-length key used for lookups and persistence.
  fn cache_hash(&self) -> String;

  /// Human-readable description (stored alongside persisted entries).
  fn description(&self) -> String;

  /// Group name used for bulk invalidation (e.g. "artworks", "saved").
  fn scope(&self) -> &'static str;

  /// Whether settled results are written to persistent storage.
  fn persist(&self) -> bool {
    true
  }
}

/// How a caller wants a query resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetchMode {
  /// Serve fresh data from cache, fetch (with retries) otherwise.
  #[default]
  Cached,
  /// Fetch regardless of freshness, joining any in-flight request.
  Force,
  /// One attempt right now: no retries, no backoff.
  Immediate,
}

/// Result from a cache operation, including data and metadata about the source.
#[derive(Debug, Clone)]
pub struct CacheResult<T> {
  /// The actual data
  pub data: T,
  /// Where the data came from
  pub source: CacheSource,
  /// When the data was fetched (if from cache)
  pub cached_at: Option<DateTime<Utc>>,
  /// The failure that forced us to fall back to cached data
  pub error: Option<ArtError>,
}

impl<T> CacheResult<T> {
  /// Create a new cache result from fresh network data.
  pub fn from_network(data: T) -> Self {
    Self {
      data,
      source: CacheSource::Network,
      cached_at: None,
      error: None,
    }
  }

  /// Create a new cache result from cached data.
  pub fn from_cache(data: T, cached_at: Option<DateTime<Utc>>) -> Self {
    Self {
      data,
      source: CacheSource::CacheFresh,
      cached_at,
      error: None,
    }
  }

  /// Last-good data kept visible after a failed refresh.
  pub fn stale_after_error(data: T, cached_at: Option<DateTime<Utc>>, error: ArtError) -> Self {
    Self {
      data,
      source: if error.is_network() {
        CacheSource::Offline
      } else {
        CacheSource::CacheStale
      },
      cached_at,
      error: Some(error),
    }
  }

  pub fn map<U>(self, f: impl FnOnce(T) -> U) -> CacheResult<U> {
    CacheResult {
      data: f(self.data),
      source: self.source,
      cached_at: self.cached_at,
      error: self.error,
    }
  }
}

/// Indicates where cached data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
  /// Fresh data from network
  Network,
  /// Data from cache, still considered fresh
  CacheFresh,
  /// Data from cache, refresh failed with a non-network error
  CacheStale,
  /// Offline mode - network unavailable, serving cached data
  Offline,
}

/// Read-only view of one cache entry.
#[derive(Debug, Clone)]
pub struct QuerySnapshot {
  pub has_data: bool,
  pub is_stale: bool,
  pub is_fetching: bool,
  pub error: Option<ArtError>,
  pub subscribers: usize,
}

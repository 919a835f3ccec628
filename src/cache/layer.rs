//! Query cache engine.
//!
//! Entries are keyed by [`QueryKey::cache_hash`] and hold the last settled
//! value as JSON. Fetches run on spawned tasks so a caller that goes away never
//! cancels the request; whichever fetch settles last writes the entry.
//! Concurrent requests for one key share a single in-flight future.

use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::policy::{retry_with_policy, QueryPolicy};
use super::storage::CacheStorage;
use super::traits::{CacheResult, Cacheable, FetchMode, QueryKey, QuerySnapshot};
use crate::connectivity::{Connectivity, ConnectivityEvent, ConnectivityMonitor};
use crate::error::{ArtError, Result};

type SharedFetch = Shared<BoxFuture<'static, Result<Value>>>;
type Fetcher = Arc<dyn Fn() -> BoxFuture<'static, Result<Value>> + Send + Sync>;

struct CacheEntry {
  scope: &'static str,
  description: String,
  persist: bool,
  data: Option<Value>,
  /// Monotonic fetch time, drives staleness
  updated_at: Option<Instant>,
  /// Wall-clock fetch time, reported to callers
  cached_at: Option<DateTime<Utc>>,
  error: Option<ArtError>,
  invalidated: bool,
  /// Fetches numbered at or below this started before the last write,
  /// invalidation or clear, and settle as stale
  invalidated_seq: u64,
  restore_attempted: bool,
  subscribers: usize,
  unused_since: Option<Instant>,
  fetch_seq: u64,
  in_flight: Option<(u64, SharedFetch)>,
  /// Last fetcher used, rerun by reconnect refetches
  fetcher: Option<Fetcher>,
}

impl CacheEntry {
  fn new<K: QueryKey + ?Sized>(key: &K) -> Self {
    Self {
      scope: key.scope(),
      description: key.description(),
      persist: key.persist(),
      data: None,
      updated_at: None,
      cached_at: None,
      error: None,
      invalidated: false,
      invalidated_seq: 0,
      restore_attempted: false,
      subscribers: 0,
      unused_since: Some(Instant::now()),
      fetch_seq: 0,
      in_flight: None,
      fetcher: None,
    }
  }

  fn is_stale(&self, stale_time: Duration) -> bool {
    if self.invalidated {
      return true;
    }
    self
      .updated_at
      .map(|t| t.elapsed() >= stale_time)
      .unwrap_or(true)
  }
}

struct Inner {
  policy: QueryPolicy,
  storage: Arc<dyn CacheStorage>,
  connectivity: ConnectivityMonitor,
  entries: Mutex<HashMap<String, CacheEntry>>,
}

impl Inner {
  fn entries(&self) -> MutexGuard<'_, HashMap<String, CacheEntry>> {
    // Entries stay consistent even if a holder panicked: every write is a
    // single field assignment.
    self
      .entries
      .lock()
      .unwrap_or_else(|poisoned| poisoned.into_inner())
  }

  fn start_fetch(
    self: &Arc<Self>,
    entry: &mut CacheEntry,
    hash: &str,
    fetcher: Fetcher,
    retry: bool,
  ) -> SharedFetch {
    entry.fetch_seq += 1;
    let id = entry.fetch_seq;
    debug!("Fetching {} (#{})", entry.description, id);

    let inner = Arc::clone(self);
    let hash = hash.to_string();
    let handle = tokio::spawn(async move {
      let result = if retry {
        retry_with_policy(&inner.policy, || fetcher()).await.0
      } else {
        fetcher().await
      };
      inner.settle(&hash, id, &result);
      result
    });

    let shared = async move {
      handle.await.unwrap_or_else(|e| {
        Err(ArtError::Unknown {
          message: format!("Fetch task failed: {}", e),
        })
      })
    }
    .boxed()
    .shared();

    entry.in_flight = Some((id, shared.clone()));
    shared
  }

  /// Apply a settled fetch. Last settled wins.
  fn settle(self: &Arc<Self>, hash: &str, id: u64, result: &Result<Value>) {
    let mut persist = None;
    let mut now_unused = false;

    {
      let mut entries = self.entries();
      match entries.get_mut(hash) {
        Some(entry) => {
          if matches!(entry.in_flight, Some((current, _)) if current == id) {
            entry.in_flight = None;
          }
          match result {
            Ok(value) => {
              entry.data = Some(value.clone());
              entry.updated_at = Some(Instant::now());
              entry.cached_at = Some(Utc::now());
              entry.error = None;
              entry.invalidated = id <= entry.invalidated_seq;
              if entry.persist {
                persist = Some((entry.scope, entry.description.clone(), value.clone()));
              }
            }
            Err(e) => entry.error = Some(e.clone()),
          }
          if entry.subscribers == 0 && entry.in_flight.is_none() {
            entry.unused_since = Some(Instant::now());
            now_unused = true;
          }
        }
        None => debug!("Discarding result for removed query {}", hash),
      }
    }

    if let Some((scope, description, value)) = persist {
      if let Err(e) = self.storage.store(hash, scope, &description, &value) {
        warn!("Failed to persist {}: {}", description, e);
      }
    }

    if now_unused {
      self.schedule_gc(hash.to_string());
    }

    match result {
      Ok(_) => self.connectivity.report(Connectivity::Online),
      Err(e) if e.is_network() => self.connectivity.report(Connectivity::Offline),
      // The remote answered, so we are reachable.
      Err(e) if e.status().is_some() => self.connectivity.report(Connectivity::Online),
      Err(_) => {}
    }
  }

  fn unsubscribe(self: &Arc<Self>, hash: &str) {
    let now_unused = {
      let mut entries = self.entries();
      match entries.get_mut(hash) {
        Some(entry) => {
          entry.subscribers = entry.subscribers.saturating_sub(1);
          if entry.subscribers == 0 {
            entry.unused_since = Some(Instant::now());
          }
          entry.subscribers == 0
        }
        None => false,
      }
    };

    if now_unused {
      self.schedule_gc(hash.to_string());
    }
  }

  fn schedule_gc(self: &Arc<Self>, hash: String) {
    let Ok(runtime) = tokio::runtime::Handle::try_current() else {
      return;
    };
    let inner = Arc::downgrade(self);
    let gc_time = self.policy.gc_time;
    runtime.spawn(async move {
      tokio::time::sleep(gc_time).await;
      if let Some(inner) = inner.upgrade() {
        debug!("GC sweep after {} went unused", hash);
        QueryCache { inner }.collect_garbage();
      }
    });
  }

  fn is_evictable(&self, entry: &CacheEntry, now: Instant) -> bool {
    entry.subscribers == 0
      && entry.in_flight.is_none()
      && entry
        .unused_since
        .map(|since| now.duration_since(since) >= self.policy.gc_time)
        .unwrap_or(false)
  }
}

/// Process-wide query cache. Cheap to clone; all clones share one store.
#[derive(Clone)]
pub struct QueryCache {
  inner: Arc<Inner>,
}

impl QueryCache {
  pub fn new(
    policy: QueryPolicy,
    storage: Arc<dyn CacheStorage>,
    connectivity: ConnectivityMonitor,
  ) -> Self {
    Self {
      inner: Arc::new(Inner {
        policy,
        storage,
        connectivity,
        entries: Mutex::new(HashMap::new()),
      }),
    }
  }

  pub fn policy(&self) -> &QueryPolicy {
    &self.inner.policy
  }

  pub fn connectivity(&self) -> &ConnectivityMonitor {
    &self.inner.connectivity
  }

  /// Serve fresh cached data, or fetch with the retry policy.
  pub async fn fetch<T, K, F, Fut>(&self, key: &K, fetcher: F) -> Result<CacheResult<T>>
  where
    T: Cacheable,
    K: QueryKey + ?Sized,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T>> + Send + 'static,
  {
    self.fetch_with(key, FetchMode::Cached, fetcher).await
  }

  /// Resolve a query.
  ///
  /// On failure, last-good data is returned with the error attached; `Err`
  /// only comes back when there is nothing to show.
  pub async fn fetch_with<T, K, F, Fut>(
    &self,
    key: &K,
    mode: FetchMode,
    fetcher: F,
  ) -> Result<CacheResult<T>>
  where
    T: Cacheable,
    K: QueryKey + ?Sized,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T>> + Send + 'static,
  {
    let hash = key.cache_hash();
    self.restore(key, &hash);

    let pending = {
      let mut entries = self.inner.entries();
      let entry = entries
        .entry(hash.clone())
        .or_insert_with(|| CacheEntry::new(key));

      if mode == FetchMode::Cached && !entry.is_stale(self.inner.policy.stale_time) {
        if let Some(data) = &entry.data {
          debug!("Cache hit for {}", entry.description);
          return Ok(CacheResult::from_cache(decode(data)?, entry.cached_at));
        }
      }

      let fetcher = erase(fetcher);
      entry.fetcher = Some(Arc::clone(&fetcher));

      let joined = match (&entry.in_flight, mode) {
        (Some((_, shared)), FetchMode::Cached | FetchMode::Force) => Some(shared.clone()),
        _ => None,
      };
      match joined {
        Some(shared) => {
          debug!("Joining in-flight fetch for {}", entry.description);
          shared
        }
        None => self
          .inner
          .start_fetch(entry, &hash, fetcher, mode != FetchMode::Immediate),
      }
    };

    match pending.await {
      Ok(value) => Ok(CacheResult::from_network(decode(&value)?)),
      Err(error) => {
        let fallback = {
          let entries = self.inner.entries();
          entries
            .get(&hash)
            .and_then(|entry| entry.data.clone().map(|data| (data, entry.cached_at)))
        };
        match fallback {
          Some((data, cached_at)) => {
            debug!("Serving last-good data after error: {}", error);
            Ok(CacheResult::stale_after_error(
              decode(&data)?,
              cached_at,
              error,
            ))
          }
          None => Err(error),
        }
      }
    }
  }

  /// Seed an entry from persistent storage, keeping its real age.
  fn restore<K: QueryKey + ?Sized>(&self, key: &K, hash: &str) {
    if !key.persist() {
      return;
    }
    let attempted = self
      .inner
      .entries()
      .get(hash)
      .map(|e| e.restore_attempted || e.data.is_some())
      .unwrap_or(false);
    if attempted {
      return;
    }

    let stored = match self.inner.storage.load(hash) {
      Ok(stored) => stored,
      Err(e) => {
        warn!("Failed to read cached {}: {}", key.description(), e);
        None
      }
    };

    let mut entries = self.inner.entries();
    let entry = entries
      .entry(hash.to_string())
      .or_insert_with(|| CacheEntry::new(key));
    entry.restore_attempted = true;

    if let Some(stored) = stored {
      if entry.data.is_none() {
        let age = (Utc::now() - stored.cached_at).to_std().unwrap_or_default();
        entry.updated_at = Instant::now().checked_sub(age);
        entry.invalidated = entry.updated_at.is_none();
        entry.cached_at = Some(stored.cached_at);
        entry.data = Some(stored.data);
        debug!(
          "Restored {} from storage ({}s old)",
          entry.description,
          age.as_secs()
        );
      }
    }
  }

  /// Synchronous snapshot of the cached value, fresh or not.
  pub fn get_query_data<T, K>(&self, key: &K) -> Option<T>
  where
    T: Cacheable,
    K: QueryKey + ?Sized,
  {
    let entries = self.inner.entries();
    let data = entries.get(&key.cache_hash())?.data.as_ref()?;
    decode(data).ok()
  }

  /// Cached value only if it is still within the staleness window.
  pub fn get_fresh_query_data<T, K>(&self, key: &K) -> Option<T>
  where
    T: Cacheable,
    K: QueryKey + ?Sized,
  {
    let entries = self.inner.entries();
    let entry = entries.get(&key.cache_hash())?;
    if entry.is_stale(self.inner.policy.stale_time) {
      return None;
    }
    decode(entry.data.as_ref()?).ok()
  }

  /// Write a value directly, as if a fetch had just returned it.
  pub fn set_query_data<T, K>(&self, key: &K, value: &T) -> Result<()>
  where
    T: Cacheable,
    K: QueryKey + ?Sized,
  {
    let value = encode(value)?;
    let hash = key.cache_hash();
    {
      let mut entries = self.inner.entries();
      let entry = entries
        .entry(hash.clone())
        .or_insert_with(|| CacheEntry::new(key));
      entry.data = Some(value.clone());
      entry.updated_at = Some(Instant::now());
      entry.cached_at = Some(Utc::now());
      entry.error = None;
      entry.invalidated = false;
      entry.invalidated_seq = entry.fetch_seq;
    }
    if key.persist() {
      self
        .inner
        .storage
        .store(&hash, key.scope(), &key.description(), &value)?;
    }
    Ok(())
  }

  pub fn snapshot<K: QueryKey + ?Sized>(&self, key: &K) -> Option<QuerySnapshot> {
    let entries = self.inner.entries();
    let entry = entries.get(&key.cache_hash())?;
    Some(QuerySnapshot {
      has_data: entry.data.is_some(),
      is_stale: entry.is_stale(self.inner.policy.stale_time),
      is_fetching: entry.in_flight.is_some(),
      error: entry.error.clone(),
      subscribers: entry.subscribers,
    })
  }

  /// Mark every entry of `scope` stale. Returns how many were marked.
  pub fn invalidate_scope(&self, scope: &str) -> usize {
    let mut entries = self.inner.entries();
    let mut count = 0;
    for entry in entries.values_mut().filter(|e| e.scope == scope) {
      entry.invalidated = true;
      entry.invalidated_seq = entry.fetch_seq;
      count += 1;
    }
    debug!("Invalidated {} {} queries", count, scope);
    count
  }

  /// Drop every result, persisted ones included. Subscribed entries are
  /// emptied rather than removed so their subscriber counts survive.
  pub fn clear(&self) -> Result<()> {
    {
      let mut entries = self.inner.entries();
      entries.retain(|_, entry| entry.subscribers > 0);
      for entry in entries.values_mut() {
        entry.data = None;
        entry.error = None;
        entry.updated_at = None;
        entry.cached_at = None;
        entry.invalidated = false;
        entry.invalidated_seq = entry.fetch_seq;
      }
    }
    self.inner.storage.clear()
  }

  /// Register a consumer. The entry cannot be evicted while the returned
  /// guard is alive.
  pub fn subscribe<K: QueryKey + ?Sized>(&self, key: &K) -> Subscription {
    let hash = key.cache_hash();
    {
      let mut entries = self.inner.entries();
      let entry = entries
        .entry(hash.clone())
        .or_insert_with(|| CacheEntry::new(key));
      entry.subscribers += 1;
      entry.unused_since = None;
    }
    Subscription {
      inner: Arc::clone(&self.inner),
      hash,
    }
  }

  /// Evict every entry that has had no subscribers for the GC window.
  pub fn collect_garbage(&self) -> usize {
    let now = Instant::now();
    let mut entries = self.inner.entries();
    let before = entries.len();
    entries.retain(|_, entry| !self.inner.is_evictable(entry, now));
    let evicted = before - entries.len();
    if evicted > 0 {
      debug!("Evicted {} unused queries", evicted);
    }
    evicted
  }

  /// Refetch subscribed queries that are stale or failed. Returns how many
  /// fetches were started.
  pub fn on_reconnect(&self) -> usize {
    if !self.inner.policy.refetch_on_reconnect {
      return 0;
    }
    self.refetch_active()
  }

  /// Same contract as [`Self::on_reconnect`], gated by the focus flag.
  pub fn on_window_focus(&self) -> usize {
    if !self.inner.policy.refetch_on_window_focus {
      return 0;
    }
    self.refetch_active()
  }

  fn refetch_active(&self) -> usize {
    let stale_time = self.inner.policy.stale_time;
    let mut entries = self.inner.entries();
    let mut started = 0;
    for (hash, entry) in entries.iter_mut() {
      let wanted = entry.subscribers > 0
        && entry.in_flight.is_none()
        && (entry.error.is_some() || entry.is_stale(stale_time));
      let Some(fetcher) = entry.fetcher.clone().filter(|_| wanted) else {
        continue;
      };
      // Nobody awaits this one; the spawned task writes the entry itself.
      drop(self.inner.start_fetch(entry, hash, fetcher, true));
      started += 1;
    }
    if started > 0 {
      debug!("Refetching {} queries", started);
    }
    started
  }

  /// Listen for connectivity recovery and refetch active queries when it
  /// happens.
  pub fn spawn_reconnect_listener(&self) -> JoinHandle<()> {
    let mut events = self.inner.connectivity.events();
    let inner = Arc::downgrade(&self.inner);
    tokio::spawn(async move {
      while let Some(event) = events.next().await {
        if event != ConnectivityEvent::Reconnected {
          continue;
        }
        let Some(inner) = inner.upgrade() else {
          break;
        };
        QueryCache { inner }.on_reconnect();
      }
    })
  }
}

/// Keeps one cache entry alive. Dropping it never cancels a fetch.
pub struct Subscription {
  inner: Arc<Inner>,
  hash: String,
}

impl Drop for Subscription {
  fn drop(&mut self) {
    self.inner.unsubscribe(&self.hash);
  }
}

fn erase<T, F, Fut>(fetcher: F) -> Fetcher
where
  T: Cacheable,
  F: Fn() -> Fut + Send + Sync + 'static,
  Fut: Future<Output = Result<T>> + Send + 'static,
{
  Arc::new(move || {
    let fut = fetcher();
    async move { encode(&fut.await?) }.boxed()
  })
}

fn encode<T: Cacheable>(value: &T) -> Result<Value> {
  serde_json::to_value(value).map_err(|e| ArtError::Unknown {
    message: format!("Failed to encode query result: {}", e),
  })
}

fn decode<T: Cacheable>(value: &Value) -> Result<T> {
  T::deserialize(value).map_err(|e| ArtError::Unknown {
    message: format!("Cached value has unexpected shape: {}", e),
  })
}

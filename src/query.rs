//! Subscriber-side handle for one cached query.
//!
//! A `Query<T>` keeps its key subscribed in the [`QueryCache`] for as long
//! as it lives, starts fetches on a spawned task, and collects the outcome
//! through a channel.
//!
//! # Example
//!
//! ```ignore
//! let repo = repository.clone();
//! let key = ArtQueryKey::ArtworkDetail { id: 27992 };
//! let mut query = Query::new(repository.cache(), &key, move |mode| {
//!     let repo = repo.clone();
//!     async move { repo.load_by_id(27992, mode).await }
//! });
//!
//! query.fetch();
//! query.settled().await;
//!
//! match query.state() {
//!     QueryState::Success(result) => show(&result.data),
//!     QueryState::Error(e) => show_error(e),
//!     QueryState::Loading | QueryState::Idle => {}
//! }
//! ```

use std::future::Future;
use std::pin::Pin;
use tokio::sync::mpsc;

use crate::cache::{CacheResult, FetchMode, QueryCache, QueryKey, Subscription};
use crate::error::{ArtError, Result};

/// The state of a query
#[derive(Debug, Clone)]
pub enum QueryState<T> {
  /// Query has not been started
  Idle,
  /// Query is currently fetching data
  Loading,
  /// Data is available. It may be last-good data with a refresh error attached.
  Success(CacheResult<T>),
  /// Query failed and there is nothing to show
  Error(ArtError),
}

impl<T> QueryState<T> {
  pub fn is_loading(&self) -> bool {
    matches!(self, QueryState::Loading)
  }

  pub fn data(&self) -> Option<&T> {
    match self {
      QueryState::Success(result) => Some(&result.data),
      _ => None,
    }
  }

  pub fn error(&self) -> Option<&ArtError> {
    match self {
      QueryState::Error(e) => Some(e),
      QueryState::Success(result) => result.error.as_ref(),
      _ => None,
    }
  }
}

type BoxFuture<T> = Pin<Box<dyn Future<Output = Result<CacheResult<T>>> + Send>>;

/// Runs the query in the requested mode.
type RunnerFn<T> = Box<dyn Fn(FetchMode) -> BoxFuture<T> + Send + Sync>;

pub struct Query<T> {
  state: QueryState<T>,
  runner: RunnerFn<T>,
  receiver: Option<mpsc::UnboundedReceiver<Result<CacheResult<T>>>>,
  _subscription: Subscription,
}

impl<T: Send + 'static> Query<T> {
  /// Create a query for `key`. The runner resolves the key through the cache
  /// and is called on every fetch.
  pub fn new<K, F, Fut>(cache: &QueryCache, key: &K, runner: F) -> Self
  where
    K: QueryKey + ?Sized,
    F: Fn(FetchMode) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<CacheResult<T>>> + Send + 'static,
  {
    Self {
      state: QueryState::Idle,
      runner: Box::new(move |mode| Box::pin(runner(mode))),
      receiver: None,
      _subscription: cache.subscribe(key),
    }
  }

  pub fn state(&self) -> &QueryState<T> {
    &self.state
  }

  pub fn data(&self) -> Option<&T> {
    self.state.data()
  }

  pub fn is_loading(&self) -> bool {
    self.state.is_loading()
  }

  /// Start fetching unless a fetch is already pending.
  pub fn fetch(&mut self) {
    if self.state.is_loading() {
      return;
    }
    self.start(FetchMode::Cached);
  }

  /// Fetch again regardless of freshness. A pending result is discarded.
  pub fn refetch(&mut self) {
    self.receiver = None;
    self.start(FetchMode::Force);
  }

  /// One immediate attempt, skipping retry backoff.
  pub fn retry_now(&mut self) {
    self.receiver = None;
    self.start(FetchMode::Immediate);
  }

  /// Wait for the pending fetch to settle. Returns `false` if nothing was
  /// pending.
  pub async fn settled(&mut self) -> bool {
    let Some(receiver) = &mut self.receiver else {
      return false;
    };
    let result = receiver.recv().await;
    self.apply(result);
    true
  }

  fn apply(&mut self, result: Option<Result<CacheResult<T>>>) {
    self.receiver = None;
    self.state = match result {
      Some(Ok(data)) => QueryState::Success(data),
      Some(Err(e)) => QueryState::Error(e),
      // Sender dropped without sending
      None => QueryState::Error(ArtError::Unknown {
        message: "Query was cancelled".to_string(),
      }),
    };
  }

  fn start(&mut self, mode: FetchMode) {
    let (tx, rx) = mpsc::unbounded_channel();
    self.receiver = Some(rx);
    self.state = QueryState::Loading;

    let future = (self.runner)(mode);
    tokio::spawn(async move {
      // Receiver may be gone; the cache entry is written either way.
      let _ = tx.send(future.await);
    });
  }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Query<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Query")
      .field("state", &self.state)
      .finish_non_exhaustive()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::art::keys::ArtQueryKey;
  use crate::art::repository::tests::{repository, FakeApi};
  use crate::art::repository::ArtworkRepository;
  use crate::art::types::Artwork;
  use crate::cache::CacheSource;
  use std::sync::atomic::Ordering;
  use std::sync::Arc;
  use std::time::Duration;

  fn detail_query(repo: &ArtworkRepository, id: u64) -> Query<Artwork> {
    let runner_repo = repo.clone();
    Query::new(repo.cache(), &ArtQueryKey::ArtworkDetail { id }, move |mode| {
      let repo = runner_repo.clone();
      async move { repo.load_by_id(id, mode).await }
    })
  }

  #[tokio::test]
  async fn test_query_success() {
    let repo = repository(Arc::new(FakeApi::default()));
    let mut query = detail_query(&repo, 3);

    assert!(matches!(query.state(), QueryState::Idle));

    query.fetch();
    assert!(query.is_loading());

    assert!(query.settled().await);
    assert_eq!(query.data().map(|a| a.id), Some(3));
    assert!(!query.settled().await);
  }

  #[tokio::test]
  async fn test_query_error() {
    let api = Arc::new(FakeApi::default());
    api.fail_with(Some(ArtError::from_status(404, "GET /artworks/3 returned 404")));
    let repo = repository(api);
    let mut query = detail_query(&repo, 3);

    query.fetch();
    query.settled().await;

    assert!(query.state().error().is_some_and(|e| e.is_client_error()));
    assert!(query.data().is_none());
  }

  #[tokio::test]
  async fn test_fetch_while_loading_is_noop() {
    let api = Arc::new(FakeApi::default());
    let repo = repository(api.clone());
    let mut query = detail_query(&repo, 1);

    query.fetch();
    query.fetch();
    query.settled().await;

    assert_eq!(api.calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test(start_paused = true)]
  async fn test_retry_now_serves_last_good_data_offline() {
    let api = Arc::new(FakeApi::default());
    let repo = repository(api.clone());
    let mut query = detail_query(&repo, 8);
    query.fetch();
    query.settled().await;

    api.fail_with(Some(ArtError::network("error sending request")));
    query.retry_now();
    query.settled().await;

    let QueryState::Success(result) = query.state() else {
      panic!("expected last-good data, got {:?}", query.state());
    };
    assert_eq!(result.source, CacheSource::Offline);
    // Immediate mode makes exactly one attempt.
    assert_eq!(api.calls.load(Ordering::SeqCst), 2);
  }

  #[tokio::test]
  async fn test_subscription_follows_handle() {
    let repo = repository(Arc::new(FakeApi::default()));
    let key = ArtQueryKey::ArtworkDetail { id: 4 };

    let query = detail_query(&repo, 4);
    assert_eq!(repo.cache().snapshot(&key).unwrap().subscribers, 1);

    drop(query);
    assert_eq!(repo.cache().snapshot(&key).unwrap().subscribers, 0);
  }

  #[tokio::test]
  async fn test_dropping_handle_keeps_fetch_running() {
    let api = Arc::new(FakeApi::default());
    let repo = repository(api.clone());
    let key = ArtQueryKey::ArtworkDetail { id: 5 };

    let mut query = detail_query(&repo, 5);
    query.fetch();
    drop(query);

    tokio::time::sleep(Duration::from_millis(50)).await;
    let cached: Option<Artwork> = repo.cache().get_query_data(&key);
    assert_eq!(cached.map(|a| a.id), Some(5));
  }
}

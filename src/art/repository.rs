//! Cache-backed artwork repository.

use std::sync::Arc;

use crate::art::{ArtworkApi, Filters};
use crate::art::keys::ArtQueryKey;
use crate::art::types::{Artwork, ArtworkPage};
use crate::cache::{CacheResult, FetchMode, QueryCache};
use crate::error::Result;

/// Artwork API with transparent caching.
///
/// Same operations as [`ArtworkApi`], but every call goes through the shared
/// [`QueryCache`], so results are deduplicated, retried per policy and kept
/// for offline use. Errors reach the caller unchanged.
#[derive(Clone)]
pub struct ArtworkRepository {
  api: Arc<dyn ArtworkApi>,
  cache: QueryCache,
}

impl ArtworkRepository {
  pub fn new(api: Arc<dyn ArtworkApi>, cache: QueryCache) -> Self {
    Self { api, cache }
  }

  pub fn cache(&self) -> &QueryCache {
    &self.cache
  }

  /// Get one page of artworks, with cache metadata for the caller.
  pub async fn load_page(
    &self,
    page: u32,
    page_size: u32,
    filters: &Filters,
    mode: FetchMode,
  ) -> Result<CacheResult<ArtworkPage>> {
    let key = ArtQueryKey::page(page, page_size, filters);
    let api = Arc::clone(&self.api);
    let filters = filters.clone();

    self
      .cache
      .fetch_with(&key, mode, move || {
        let api = Arc::clone(&api);
        let filters = filters.clone();
        async move { api.fetch_page(page, page_size, &filters).await }
      })
      .await
  }

  /// Get a single artwork by id with caching.
  pub async fn fetch_by_id(&self, id: u64) -> Result<Artwork> {
    let result = self.load_by_id(id, FetchMode::Cached).await?;
    Ok(result.data)
  }

  pub async fn load_by_id(&self, id: u64, mode: FetchMode) -> Result<CacheResult<Artwork>> {
    let key = ArtQueryKey::ArtworkDetail { id };
    let api = Arc::clone(&self.api);

    self
      .cache
      .fetch_with(&key, mode, move || {
        let api = Arc::clone(&api);
        async move { api.fetch_by_id(id).await }
      })
      .await
  }

  /// Search artworks with caching.
  pub async fn load_search(
    &self,
    query: &str,
    filters: &Filters,
    mode: FetchMode,
  ) -> Result<CacheResult<Vec<Artwork>>> {
    let key = ArtQueryKey::search(query, filters);
    let api = Arc::clone(&self.api);
    let query = query.to_string();
    let filters = filters.clone();

    self
      .cache
      .fetch_with(&key, mode, move || {
        let api = Arc::clone(&api);
        let query = query.clone();
        let filters = filters.clone();
        async move { api.search(&query, &filters).await }
      })
      .await
  }
}

#[cfg(test)]
pub(crate) mod tests {
  use super::*;
  use crate::art::filters::filters_from;
  use crate::art::types::PaginationMeta;
  use crate::cache::{CacheSource, NoopStorage, QueryPolicy};
  use crate::connectivity::ConnectivityMonitor;
  use crate::error::ArtError;
  use async_trait::async_trait;
  use std::sync::atomic::{AtomicU32, Ordering};
  use std::sync::Mutex;

  /// In-memory stand-in for the remote API.
  #[derive(Default)]
  pub struct FakeApi {
    pub calls: AtomicU32,
    pub failure: Mutex<Option<ArtError>>,
  }

  impl FakeApi {
    pub fn fail_with(&self, error: Option<ArtError>) {
      *self.failure.lock().unwrap() = error;
    }

    fn respond<T>(&self, value: T) -> Result<T> {
      self.calls.fetch_add(1, Ordering::SeqCst);
      match self.failure.lock().unwrap().clone() {
        Some(err) => Err(err),
        None => Ok(value),
      }
    }
  }

  pub fn artwork(id: u64) -> Artwork {
    Artwork {
      id,
      title: format!("Artwork {}", id),
      artist_display: None,
      date_display: None,
      image_id: None,
      department_title: None,
      artwork_type_title: None,
      thumbnail_alt_text: None,
    }
  }

  #[async_trait]
  impl ArtworkApi for FakeApi {
    async fn fetch_page(
      &self,
      page: u32,
      page_size: u32,
      _filters: &Filters,
    ) -> Result<ArtworkPage> {
      let first = u64::from((page - 1) * page_size);
      self.respond(ArtworkPage {
        items: (first..first + u64::from(page_size)).map(artwork).collect(),
        pagination: PaginationMeta {
          total: 100,
          limit: page_size,
          offset: first,
          total_pages: 100 / page_size,
          current_page: page,
        },
      })
    }

    async fn fetch_by_id(&self, id: u64) -> Result<Artwork> {
      self.respond(artwork(id))
    }

    async fn search(&self, query: &str, _filters: &Filters) -> Result<Vec<Artwork>> {
      self.respond(vec![Artwork {
        title: query.to_string(),
        ..artwork(1)
      }])
    }
  }

  pub fn repository(api: Arc<FakeApi>) -> ArtworkRepository {
    let cache = QueryCache::new(
      QueryPolicy::default(),
      Arc::new(NoopStorage),
      ConnectivityMonitor::new(),
    );
    ArtworkRepository::new(api, cache)
  }

  #[tokio::test]
  async fn test_pages_are_cached_per_parameters() {
    let api = Arc::new(FakeApi::default());
    let repo = repository(api.clone());

    let page = repo
      .load_page(2, 10, &Filters::new(), FetchMode::Cached)
      .await
      .unwrap();
    assert_eq!(page.source, CacheSource::Network);
    assert_eq!(page.data.items.len(), 10);
    assert_eq!(page.data.items[0].id, 10);
    assert_eq!(page.data.pagination.current_page, 2);

    let blank = filters_from([("department_title", Some(""))]);
    let again = repo
      .load_page(2, 10, &blank, FetchMode::Cached)
      .await
      .unwrap();
    assert_eq!(again.source, CacheSource::CacheFresh);
    assert_eq!(api.calls.load(Ordering::SeqCst), 1);

    repo
      .load_page(3, 10, &Filters::new(), FetchMode::Cached)
      .await
      .unwrap();
    assert_eq!(api.calls.load(Ordering::SeqCst), 2);
  }

  #[tokio::test]
  async fn test_errors_propagate_unchanged() {
    let api = Arc::new(FakeApi::default());
    let repo = repository(api.clone());
    let original = ArtError::from_status(404, "GET /artworks/42 returned 404 Not Found");
    api.fail_with(Some(original.clone()));

    let err = repo.fetch_by_id(42).await.unwrap_err();

    assert_eq!(err, original);
    assert_eq!(api.calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test(start_paused = true)]
  async fn test_cached_detail_survives_outage() {
    let api = Arc::new(FakeApi::default());
    let repo = repository(api.clone());

    repo.fetch_by_id(7).await.unwrap();
    api.fail_with(Some(ArtError::network("error sending request for url")));

    let result = repo.load_by_id(7, FetchMode::Force).await.unwrap();
    assert_eq!(result.source, CacheSource::Offline);
    assert_eq!(result.data.id, 7);
    assert!(result.error.is_some());
  }

  #[tokio::test]
  async fn test_search_results() {
    let api = Arc::new(FakeApi::default());
    let repo = repository(api.clone());

    let results = repo
      .load_search("water lilies", &Filters::new(), FetchMode::Cached)
      .await
      .unwrap();
    assert_eq!(results.data[0].title, "water lilies");

    repo
      .load_search("Water Lilies ", &Filters::new(), FetchMode::Cached)
      .await
      .unwrap();
    assert_eq!(api.calls.load(Ordering::SeqCst), 1);
  }
}

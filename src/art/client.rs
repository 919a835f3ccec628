use async_trait::async_trait;
use color_eyre::{eyre::eyre, Result as EyreResult};
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use crate::art::api_types::{ApiDetailResponse, ApiListResponse, ARTWORK_FIELDS};
use crate::art::filters::{clean_filters, param_value, Filters};
use crate::art::types::{Artwork, ArtworkPage};
use crate::config::ApiConfig;
use crate::error::{is_network_error, ArtError, Result};

/// Remote operations of the art-collection API.
///
/// Implementations return transport failures classified but otherwise
/// untouched, so callers can still tell a dropped connection from a bad
/// request.
#[async_trait]
pub trait ArtworkApi: Send + Sync {
  async fn fetch_page(&self, page: u32, page_size: u32, filters: &Filters) -> Result<ArtworkPage>;

  async fn fetch_by_id(&self, id: u64) -> Result<Artwork>;

  async fn search(&self, query: &str, filters: &Filters) -> Result<Vec<Artwork>>;
}

/// HTTP client for the Art Institute of Chicago style API
#[derive(Clone)]
pub struct ArtApiClient {
  http: Client,
  base_url: Url,
  search_limit: u32,
}

impl ArtApiClient {
  pub fn new(config: &ApiConfig) -> EyreResult<Self> {
    let base_url = Url::parse(config.base_url.trim_end_matches('/'))
      .map_err(|e| eyre!("Invalid API base URL {}: {}", config.base_url, e))?;

    let http = Client::builder()
      .timeout(Duration::from_secs(config.timeout_secs))
      .user_agent(concat!("artvault/", env!("CARGO_PKG_VERSION")))
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self {
      http,
      base_url,
      search_limit: config.page_size,
    })
  }

  fn endpoint(&self, path: &str) -> Result<Url> {
    let url = format!("{}/{}", self.base_url.as_str().trim_end_matches('/'), path);
    Url::parse(&url).map_err(|e| ArtError::Unknown {
      message: format!("Invalid endpoint {}: {}", url, e),
    })
  }

  /// GET `url` and decode the JSON body, classifying any failure.
  async fn get_json<T: DeserializeOwned>(
    &self,
    url: Url,
    params: &[(String, String)],
  ) -> Result<T> {
    debug!("GET {}", url);

    let response = self
      .http
      .get(url.clone())
      .query(params)
      .send()
      .await
      .map_err(|e| log_failure(&url, transport_error(&url, &e)))?;

    let status = response.status();
    if !status.is_success() {
      return Err(log_failure(
        &url,
        ArtError::from_status(status.as_u16(), format!("GET {} returned {}", url, status)),
      ));
    }

    response.json::<T>().await.map_err(|e| {
      let err = if e.is_decode() {
        ArtError::Unknown {
          message: format!("Failed to decode response from {}: {}", url, e),
        }
      } else {
        transport_error(&url, &e)
      };
      log_failure(&url, err)
    })
  }
}

#[async_trait]
impl ArtworkApi for ArtApiClient {
  /// Get one page of artworks
  async fn fetch_page(&self, page: u32, page_size: u32, filters: &Filters) -> Result<ArtworkPage> {
    let mut params = vec![
      ("page".to_string(), page.to_string()),
      ("limit".to_string(), page_size.to_string()),
      ("fields".to_string(), ARTWORK_FIELDS.to_string()),
    ];
    params.extend(
      clean_filters(filters)
        .iter()
        .filter_map(|(key, value)| param_value(value).map(|v| (key.clone(), v))),
    );

    let response: ApiListResponse = self.get_json(self.endpoint("artworks")?, &params).await?;
    Ok(response.into())
  }

  /// Get a single artwork by id
  async fn fetch_by_id(&self, id: u64) -> Result<Artwork> {
    let params = [("fields".to_string(), ARTWORK_FIELDS.to_string())];
    let response: ApiDetailResponse = self
      .get_json(self.endpoint(&format!("artworks/{}", id))?, &params)
      .await?;
    Ok(response.data.into())
  }

  /// Full-text search; filters become exact-match terms
  async fn search(&self, query: &str, filters: &Filters) -> Result<Vec<Artwork>> {
    let mut params = vec![
      ("q".to_string(), query.to_string()),
      ("limit".to_string(), self.search_limit.to_string()),
      ("fields".to_string(), ARTWORK_FIELDS.to_string()),
    ];
    params.extend(
      clean_filters(filters)
        .iter()
        .filter_map(|(key, value)| {
          param_value(value).map(|v| (format!("query[term][{}]", key), v))
        }),
    );

    let response: ApiListResponse = self
      .get_json(self.endpoint("artworks/search")?, &params)
      .await?;
    Ok(ArtworkPage::from(response).items)
  }
}

/// Classify a reqwest failure that produced no usable response.
fn transport_error(url: &Url, e: &reqwest::Error) -> ArtError {
  let message = format!("GET {} failed: {}", url, e);
  if let Some(status) = e.status() {
    return ArtError::from_status(status.as_u16(), message);
  }
  if e.is_connect() || e.is_timeout() || e.is_request() || is_network_error(Some(e)) {
    return ArtError::network(message);
  }
  ArtError::from_message(message)
}

fn log_failure(url: &Url, error: ArtError) -> ArtError {
  warn!(url = %url, status = ?error.status(), "Artwork request failed: {}", error);
  error
}

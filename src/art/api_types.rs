//! Serde-deserializable types matching art API responses.
//!
//! These types are separate from domain types to allow clean deserialization
//! while keeping domain types focused on application needs.

use serde::Deserialize;

use super::types::{Artwork, ArtworkPage, PaginationMeta};

/// Fields requested from the API. Everything else is ignored.
pub const ARTWORK_FIELDS: &str =
  "id,title,artist_display,date_display,image_id,department_title,artwork_type_title,thumbnail";

#[derive(Debug, Deserialize)]
pub struct ApiThumbnail {
  pub alt_text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ApiArtwork {
  pub id: u64,
  #[serde(default)]
  pub title: Option<String>,
  pub artist_display: Option<String>,
  pub date_display: Option<String>,
  pub image_id: Option<String>,
  pub department_title: Option<String>,
  pub artwork_type_title: Option<String>,
  pub thumbnail: Option<ApiThumbnail>,
}

impl From<ApiArtwork> for Artwork {
  fn from(api: ApiArtwork) -> Self {
    Self {
      id: api.id,
      title: api.title.unwrap_or_else(|| "Untitled".to_string()),
      artist_display: api.artist_display,
      date_display: api.date_display,
      image_id: api.image_id,
      department_title: api.department_title,
      artwork_type_title: api.artwork_type_title,
      thumbnail_alt_text: api.thumbnail.and_then(|t| t.alt_text),
    }
  }
}

#[derive(Debug, Deserialize, Default)]
pub struct ApiPagination {
  #[serde(default)]
  pub total: u64,
  #[serde(default)]
  pub limit: u32,
  #[serde(default)]
  pub offset: u64,
  #[serde(default)]
  pub total_pages: u32,
  #[serde(default)]
  pub current_page: u32,
}

impl From<ApiPagination> for PaginationMeta {
  fn from(api: ApiPagination) -> Self {
    Self {
      total: api.total,
      limit: api.limit,
      offset: api.offset,
      total_pages: api.total_pages,
      current_page: api.current_page,
    }
  }
}

// ============================================================================
// List and search endpoint response
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiListResponse {
  #[serde(default)]
  pub pagination: ApiPagination,
  #[serde(default)]
  pub data: Vec<ApiArtwork>,
}

impl From<ApiListResponse> for ArtworkPage {
  fn from(api: ApiListResponse) -> Self {
    Self {
      items: api.data.into_iter().map(Artwork::from).collect(),
      pagination: api.pagination.into(),
    }
  }
}

// ============================================================================
// Detail endpoint response
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiDetailResponse {
  pub data: ApiArtwork,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_list_response_into_page() {
    let body = r#"{
      "pagination": {"total": 2, "limit": 2, "offset": 0, "total_pages": 1, "current_page": 1},
      "data": [
        {"id": 27992, "title": "A Sunday on La Grande Jatte", "artist_display": "Georges Seurat",
         "image_id": "2d484387", "thumbnail": {"alt_text": "Figures in a park"}},
        {"id": 1, "title": null}
      ],
      "config": {"iiif_url": "https://www.artic.edu/iiif/2"}
    }"#;

    let page: ArtworkPage = serde_json::from_str::<ApiListResponse>(body).unwrap().into();

    assert_eq!(page.items.len(), 2);
    assert_eq!(page.items[0].thumbnail_alt_text.as_deref(), Some("Figures in a park"));
    assert_eq!(page.items[1].title, "Untitled");
    assert_eq!(page.pagination.total_pages, 1);
    assert!(!page.pagination.has_next());
  }

  #[test]
  fn test_image_url() {
    let body = r#"{"data": {"id": 5, "image_id": "abc"}}"#;
    let artwork: Artwork = serde_json::from_str::<ApiDetailResponse>(body)
      .unwrap()
      .data
      .into();
    assert_eq!(
      artwork.image_url("https://www.artic.edu/iiif/2/", 843).as_deref(),
      Some("https://www.artic.edu/iiif/2/abc/full/843,/0/default.jpg")
    );
  }
}

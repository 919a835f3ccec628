use serde::{Deserialize, Serialize};

/// Artwork as shown in lists and detail views
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artwork {
  pub id: u64,
  pub title: String,
  pub artist_display: Option<String>,
  pub date_display: Option<String>,
  pub image_id: Option<String>,
  pub department_title: Option<String>,
  pub artwork_type_title: Option<String>,
  pub thumbnail_alt_text: Option<String>,
}

impl Artwork {
  /// IIIF image URL at the given width, if the artwork has an image.
  pub fn image_url(&self, iiif_base: &str, width: u32) -> Option<String> {
    self.image_id.as_ref().map(|id| {
      format!(
        "{}/{}/full/{},/0/default.jpg",
        iiif_base.trim_end_matches('/'),
        id,
        width
      )
    })
  }
}

/// Pagination metadata returned with list and search results
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationMeta {
  pub total: u64,
  pub limit: u32,
  pub offset: u64,
  pub total_pages: u32,
  pub current_page: u32,
}

impl PaginationMeta {
  pub fn has_next(&self) -> bool {
    self.current_page < self.total_pages
  }
}

/// One page of artworks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtworkPage {
  pub items: Vec<Artwork>,
  pub pagination: PaginationMeta,
}

//! Plain-text rendering shared by the one-shot commands and `browse`.

use chrono::Local;

use crate::art::types::{Artwork, PaginationMeta};
use crate::cache::{CacheResult, CacheSource};

const TITLE_WIDTH: usize = 48;
const IMAGE_WIDTH: u32 = 843;

/// Truncate to `max_len` characters, adding "..." if truncated
pub fn truncate(s: &str, max_len: usize) -> String {
  if s.chars().count() <= max_len {
    s.to_string()
  } else {
    let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
    format!("{}...", kept)
  }
}

pub fn artwork_line(artwork: &Artwork) -> String {
  let artist = artwork
    .artist_display
    .as_deref()
    .and_then(|a| a.lines().next())
    .unwrap_or("Unknown artist");
  format!(
    "{:>8}  {:<width$}  {}",
    artwork.id,
    truncate(&artwork.title, TITLE_WIDTH),
    artist,
    width = TITLE_WIDTH
  )
}

pub fn artwork_list(items: &[Artwork]) -> String {
  if items.is_empty() {
    return "No artworks.".to_string();
  }
  items.iter().map(artwork_line).collect::<Vec<_>>().join("\n")
}

pub fn artwork_detail(artwork: &Artwork, iiif_base: &str) -> String {
  let mut lines = vec![format!("{} (#{})", artwork.title, artwork.id)];
  let fields = [
    ("Artist", &artwork.artist_display),
    ("Date", &artwork.date_display),
    ("Department", &artwork.department_title),
    ("Type", &artwork.artwork_type_title),
    ("Description", &artwork.thumbnail_alt_text),
  ];
  for (label, value) in fields {
    if let Some(value) = value.as_deref().filter(|v| !v.is_empty()) {
      lines.push(format!("{:<12}{}", format!("{}:", label), value.replace('\n', ", ")));
    }
  }
  if let Some(url) = artwork.image_url(iiif_base, IMAGE_WIDTH) {
    lines.push(format!("{:<12}{}", "Image:", url));
  }
  lines.join("\n")
}

pub fn page_footer(pagination: &PaginationMeta) -> String {
  format!(
    "page {} of {} ({} artworks)",
    pagination.current_page, pagination.total_pages, pagination.total
  )
}

/// One line about where the data came from, when it is not fresh.
pub fn source_notice<T>(result: &CacheResult<T>) -> Option<String> {
  let when = result
    .cached_at
    .map(|t| t.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string())
    .unwrap_or_else(|| "earlier".to_string());

  match result.source {
    CacheSource::Network | CacheSource::CacheFresh => None,
    CacheSource::Offline => Some(format!("Offline: showing results saved {}", when)),
    CacheSource::CacheStale => Some(format!(
      "Refresh failed ({}); showing results saved {}",
      result
        .error
        .as_ref()
        .map(|e| e.to_string())
        .unwrap_or_default(),
      when
    )),
  }
}

pub fn offline_view() -> &'static str {
  "You are offline.\n\
   Check your connection. Saved artworks are still available with `saved`.\n\
   [r] retry now  [h] home  [q] quit"
}

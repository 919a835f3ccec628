//! Query keys for artwork data.

use sha2::{Digest, Sha256};

use crate::art::filters::{clean_filters, CleanFilters, Filters};
use crate::cache::QueryKey;
use crate::collections::CollectionKind;

/// Query key types for artwork lookups.
#[derive(Clone, Debug)]
pub enum ArtQueryKey {
  /// One page of the artwork list
  ArtworkPage {
    page: u32,
    page_size: u32,
    filters: CleanFilters,
  },
  /// A single artwork by id
  ArtworkDetail { id: u64 },
  /// Full-text search
  Search { query: String, filters: CleanFilters },
  /// A locally stored collection
  Collection(CollectionKind),
}

impl ArtQueryKey {
  /// Page key; filters are cleaned so `{dept: ""}` and `{}` share an entry.
  pub fn page(page: u32, page_size: u32, filters: &Filters) -> Self {
    Self::ArtworkPage {
      page,
      page_size,
      filters: clean_filters(filters),
    }
  }

  pub fn search(query: &str, filters: &Filters) -> Self {
    Self::Search {
      query: query.to_string(),
      filters: clean_filters(filters),
    }
  }
}

impl QueryKey for ArtQueryKey {
  fn cache_hash(&self) -> String {
    let input = match self {
      Self::ArtworkPage {
        page,
        page_size,
        filters,
      } => format!("artworks:{}:{}:{}", page, page_size, encode_filters(filters)),
      Self::ArtworkDetail { id } => format!("artwork:{}", id),
      Self::Search { query, filters } => {
        format!("search:{}:{}", normalize_query(query), encode_filters(filters))
      }
      Self::Collection(kind) => format!("collection:{}", kind.as_str()),
    };

    // SHA256 hash for stable, fixed-length keys
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
  }

  fn description(&self) -> String {
    match self {
      Self::ArtworkPage { page, filters, .. } => {
        if filters.is_empty() {
          format!("artworks page {}", page)
        } else {
          format!("artworks page {} ({})", page, encode_filters(filters))
        }
      }
      Self::ArtworkDetail { id } => format!("artwork {}", id),
      Self::Search { query, .. } => format!("search: {}", query),
      Self::Collection(kind) => format!("{} artworks", kind.as_str()),
    }
  }

  fn scope(&self) -> &'static str {
    match self {
      Self::ArtworkPage { .. } | Self::ArtworkDetail { .. } => "artworks",
      Self::Search { .. } => "search",
      Self::Collection(kind) => kind.as_str(),
    }
  }

  /// Collections already live in SQLite; persisting them again buys nothing.
  fn persist(&self) -> bool {
    !matches!(self, Self::Collection(_))
  }
}

/// BTreeMap keeps keys sorted, so equal filter sets encode identically.
fn encode_filters(filters: &CleanFilters) -> String {
  serde_json::to_string(filters).unwrap_or_default()
}

/// Normalize search text for consistent hashing.
/// Trims whitespace and lowercases for case-insensitive matching.
fn normalize_query(query: &str) -> String {
  query.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::art::filters::filters_from;

  #[test]
  fn test_empty_filter_values_share_a_key() {
    let blank = filters_from([("department_title", Some("")), ("artwork_type_title", None)]);
    assert_eq!(
      ArtQueryKey::page(1, 12, &blank).cache_hash(),
      ArtQueryKey::page(1, 12, &Filters::new()).cache_hash()
    );
  }

  #[test]
  fn test_keys_differ_by_parameters() {
    let none = Filters::new();
    let prints = filters_from([("department_title", Some("Prints"))]);
    let hashes = [
      ArtQueryKey::page(1, 12, &none).cache_hash(),
      ArtQueryKey::page(2, 12, &none).cache_hash(),
      ArtQueryKey::page(1, 12, &prints).cache_hash(),
      ArtQueryKey::ArtworkDetail { id: 1 }.cache_hash(),
      ArtQueryKey::search("monet", &none).cache_hash(),
      ArtQueryKey::Collection(CollectionKind::Saved).cache_hash(),
      ArtQueryKey::Collection(CollectionKind::Disliked).cache_hash(),
    ];
    let unique: std::collections::HashSet<_> = hashes.iter().collect();
    assert_eq!(unique.len(), hashes.len());
    assert!(hashes.iter().all(|h| h.len() == 64));
  }

  #[test]
  fn test_search_is_case_insensitive() {
    let none = Filters::new();
    assert_eq!(
      ArtQueryKey::search("  Monet ", &none).cache_hash(),
      ArtQueryKey::search("monet", &none).cache_hash()
    );
  }

  #[test]
  fn test_scopes() {
    assert_eq!(ArtQueryKey::ArtworkDetail { id: 3 }.scope(), "artworks");
    assert_eq!(ArtQueryKey::Collection(CollectionKind::Saved).scope(), "saved");
    assert!(!ArtQueryKey::Collection(CollectionKind::Saved).persist());
    assert!(ArtQueryKey::search("x", &Filters::new()).persist());
  }
}

//! Art-collection API access: wire types, HTTP client, cache keys and the
//! cache-backed repository.

pub mod api_types;
pub mod client;
pub mod filters;
pub mod keys;
pub mod repository;
pub mod types;

pub use client::{ArtApiClient, ArtworkApi};
pub use filters::{filters_from, Filters};
pub use keys::ArtQueryKey;
pub use repository::ArtworkRepository;
pub use types::{Artwork, ArtworkPage};

//! Key-indexed async data cache with retry, staleness and offline support.
//!
//! This module is independent of the artwork API:
//! - `policy` decides freshness, eviction and retries
//! - `layer` runs fetches, coalesces them and tracks subscribers
//! - `storage` persists settled results so stale data survives a restart

mod layer;
mod policy;
mod storage;
mod traits;

pub use layer::{QueryCache, Subscription};
pub use policy::QueryPolicy;
pub use storage::{CacheStorage, NoopStorage, SqliteStorage};
pub use traits::{CacheResult, CacheSource, FetchMode, QueryKey};

//! SQLite schema for everything artvault keeps on the device.

pub const SCHEMA: &str = r#"
-- Persisted query results (one JSON document per query hash)
CREATE TABLE IF NOT EXISTS query_cache (
    query_hash TEXT PRIMARY KEY,
    scope TEXT NOT NULL,
    description TEXT NOT NULL,
    data BLOB NOT NULL,
    cached_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_query_cache_scope ON query_cache(scope);

-- Saved and disliked artworks
CREATE TABLE IF NOT EXISTS collection_items (
    collection TEXT NOT NULL,
    artwork_id INTEGER NOT NULL,
    snapshot BLOB NOT NULL,
    added_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (collection, artwork_id)
);

-- Small key-value records (user preference)
CREATE TABLE IF NOT EXISTS kv_store (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;

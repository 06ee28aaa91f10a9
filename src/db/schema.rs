pub const SCHEMA_VERSION: i32 = 2;

pub const SCHEMA_V1: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    version INTEGER NOT NULL
);

-- Raw feed entries, one row per contact
CREATE TABLE IF NOT EXISTS entries (
    short_id TEXT PRIMARY KEY,
    payload TEXT NOT NULL,
    position INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_entries_position ON entries(position);
"#;

/// V2 migration: key/value metadata about the last fetch (etag, fetched_at)
pub const MIGRATION_V2: &str = r#"
CREATE TABLE IF NOT EXISTS feed_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

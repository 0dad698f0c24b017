//! Database schema definitions
//!
//! This module contains the SQL schema of the SQLite record store.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Harvested records, in insertion order
CREATE TABLE IF NOT EXISTS records (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    id TEXT NOT NULL UNIQUE,
    title TEXT NOT NULL,
    site_url TEXT NOT NULL,
    page_url TEXT NOT NULL,
    content TEXT,
    published_at TEXT,
    categories TEXT NOT NULL,
    saved_at TEXT NOT NULL
);

-- Every processed thread id, with or without a record
CREATE TABLE IF NOT EXISTS seen_ids (
    id TEXT PRIMARY KEY,
    processed_at TEXT NOT NULL
);
"#;

/// Initializes the database schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)
}

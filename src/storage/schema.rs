//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the harvest database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Track harvest runs
CREATE TABLE IF NOT EXISTS harvest_runs (
    run_id TEXT PRIMARY KEY,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    config_hash TEXT NOT NULL,
    status TEXT NOT NULL,
    pages_fetched INTEGER NOT NULL DEFAULT 0,
    records_parsed INTEGER NOT NULL DEFAULT 0,
    parse_failures INTEGER NOT NULL DEFAULT 0,
    emails_found INTEGER NOT NULL DEFAULT 0
);

-- Lossless archive of every fetched profile page
CREATE TABLE IF NOT EXISTS raw_pages (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id TEXT NOT NULL REFERENCES harvest_runs(run_id),
    source_id TEXT NOT NULL,
    url TEXT NOT NULL,
    html TEXT NOT NULL,
    fetch_method TEXT NOT NULL,
    captured_at TEXT NOT NULL,
    UNIQUE(run_id, url)
);

CREATE INDEX IF NOT EXISTS idx_raw_pages_source ON raw_pages(source_id);

-- Latest normalized record per profile URL
CREATE TABLE IF NOT EXISTS records (
    url TEXT PRIMARY KEY,
    source_id TEXT,
    name TEXT,
    title TEXT,
    bio TEXT,
    expertise TEXT,
    email TEXT,
    harvested_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_records_source ON records(source_id);

-- Per-source quality metrics for each run
CREATE TABLE IF NOT EXISTS source_metrics (
    run_id TEXT NOT NULL REFERENCES harvest_runs(run_id),
    source_id TEXT NOT NULL,
    total_urls INTEGER NOT NULL,
    pages_fetched INTEGER NOT NULL,
    parse_failures INTEGER NOT NULL,
    failed_pct REAL NOT NULL,
    records_parsed INTEGER NOT NULL,
    emails_found INTEGER NOT NULL,
    email_pct REAL NOT NULL,
    heavy_fetches INTEGER NOT NULL,
    heavy_pct REAL NOT NULL,
    recorded_at TEXT NOT NULL,
    PRIMARY KEY (run_id, source_id)
);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}

//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::harvest::{FetchMethod, NormalizedRecord, RawCapture};
use crate::output::{RunTotals, SourceMetrics};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{RunRecord, RunStatus};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;

const RUN_COLUMNS: &str = "run_id, started_at, finished_at, config_hash, status, \
     pages_fetched, records_parsed, parse_failures, emails_found";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(StorageError)` - Failed to open database
    pub fn new(path: &Path) -> StorageResult<Self> {
        let conn = init_database(path)?;
        Ok(Self { conn })
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    fn count(&self, sql: &str) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(sql, [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        run_id: row.get(0)?,
        started_at: row.get(1)?,
        finished_at: row.get(2)?,
        config_hash: row.get(3)?,
        status: RunStatus::from_db_string(&row.get::<_, String>(4)?).unwrap_or(RunStatus::Failed),
        pages_fetched: row.get::<_, i64>(5)? as u64,
        records_parsed: row.get::<_, i64>(6)? as u64,
        parse_failures: row.get::<_, i64>(7)? as u64,
        emails_found: row.get::<_, i64>(8)? as u64,
    })
}

impl Storage for SqliteStorage {
    // ===== Run Management =====

    fn create_run(&mut self, run_id: &str, config_hash: &str) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO harvest_runs (run_id, started_at, config_hash, status) VALUES (?1, ?2, ?3, ?4)",
            params![run_id, now, config_hash, RunStatus::Running.to_db_string()],
        )?;
        Ok(())
    }

    fn get_run(&self, run_id: &str) -> StorageResult<RunRecord> {
        let sql = format!("SELECT {} FROM harvest_runs WHERE run_id = ?1", RUN_COLUMNS);
        self.conn
            .query_row(&sql, params![run_id], run_from_row)
            .optional()?
            .ok_or_else(|| StorageError::RunNotFound(run_id.to_string()))
    }

    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>> {
        let sql = format!(
            "SELECT {} FROM harvest_runs ORDER BY started_at DESC, rowid DESC LIMIT 1",
            RUN_COLUMNS
        );
        let run = self.conn.query_row(&sql, [], run_from_row).optional()?;
        Ok(run)
    }

    fn finish_run(
        &mut self,
        run_id: &str,
        status: RunStatus,
        totals: &RunTotals,
    ) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let updated = self.conn.execute(
            "UPDATE harvest_runs
             SET status = ?1, finished_at = ?2, pages_fetched = ?3, records_parsed = ?4,
                 parse_failures = ?5, emails_found = ?6
             WHERE run_id = ?7",
            params![
                status.to_db_string(),
                now,
                totals.pages_fetched as i64,
                totals.records_parsed as i64,
                totals.parse_failures as i64,
                totals.emails_found as i64,
                run_id
            ],
        )?;
        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id.to_string()));
        }
        Ok(())
    }

    // ===== Harvest Results =====

    fn insert_raw_pages(&mut self, captures: &[RawCapture]) -> StorageResult<usize> {
        let tx = self.conn.transaction()?;
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO raw_pages (run_id, source_id, url, html, fetch_method, captured_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            for capture in captures {
                inserted += stmt.execute(params![
                    capture.run_id,
                    capture.source_id,
                    capture.url,
                    capture.html,
                    capture.fetch_method.to_db_string(),
                    capture.captured_at.to_rfc3339(),
                ])?;
            }
        }
        tx.commit()?;
        Ok(inserted)
    }

    fn upsert_records(
        &mut self,
        records: &[NormalizedRecord],
        harvested_at: DateTime<Utc>,
    ) -> StorageResult<usize> {
        let harvested_at = harvested_at.to_rfc3339();
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO records (url, source_id, name, title, bio, expertise, email, harvested_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                 ON CONFLICT(url) DO UPDATE SET
                    source_id = excluded.source_id,
                    name = excluded.name,
                    title = excluded.title,
                    bio = excluded.bio,
                    expertise = excluded.expertise,
                    email = excluded.email,
                    harvested_at = excluded.harvested_at",
            )?;
            for record in records {
                let expertise = record
                    .expertise
                    .as_ref()
                    .map(serde_json::to_string)
                    .transpose()?;
                stmt.execute(params![
                    record.url,
                    record.source_id,
                    record.name,
                    record.title,
                    record.bio,
                    expertise,
                    record.email,
                    harvested_at,
                ])?;
            }
        }
        tx.commit()?;
        Ok(records.len())
    }

    fn get_record(&self, url: &str) -> StorageResult<Option<NormalizedRecord>> {
        let row = self
            .conn
            .query_row(
                "SELECT url, source_id, name, title, bio, expertise, email FROM records WHERE url = ?1",
                params![url],
                |row| {
                    Ok((
                        NormalizedRecord {
                            url: row.get(0)?,
                            source_id: row.get(1)?,
                            name: row.get(2)?,
                            title: row.get(3)?,
                            bio: row.get(4)?,
                            expertise: None,
                            email: row.get(6)?,
                        },
                        row.get::<_, Option<String>>(5)?,
                    ))
                },
            )
            .optional()?;

        match row {
            Some((mut record, expertise)) => {
                record.expertise = expertise
                    .as_deref()
                    .map(serde_json::from_str)
                    .transpose()?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    // ===== Metrics =====

    fn insert_source_metrics(
        &mut self,
        run_id: &str,
        metrics: &SourceMetrics,
    ) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT OR REPLACE INTO source_metrics
             (run_id, source_id, total_urls, pages_fetched, parse_failures, failed_pct,
              records_parsed, emails_found, email_pct, heavy_fetches, heavy_pct, recorded_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                run_id,
                metrics.source_id,
                metrics.total_urls as i64,
                metrics.pages_fetched as i64,
                metrics.parse_failures as i64,
                metrics.failed_pct,
                metrics.records_parsed as i64,
                metrics.emails_found as i64,
                metrics.email_pct,
                metrics.heavy_fetches as i64,
                metrics.heavy_pct,
                now
            ],
        )?;
        Ok(())
    }

    fn get_source_metrics(&self, run_id: &str) -> StorageResult<Vec<SourceMetrics>> {
        let mut stmt = self.conn.prepare(
            "SELECT source_id, total_urls, pages_fetched, parse_failures, failed_pct,
                    records_parsed, emails_found, email_pct, heavy_fetches, heavy_pct
             FROM source_metrics WHERE run_id = ?1 ORDER BY source_id",
        )?;

        let metrics = stmt
            .query_map(params![run_id], |row| {
                Ok(SourceMetrics {
                    source_id: row.get(0)?,
                    total_urls: row.get::<_, i64>(1)? as u64,
                    pages_fetched: row.get::<_, i64>(2)? as u64,
                    parse_failures: row.get::<_, i64>(3)? as u64,
                    failed_pct: row.get(4)?,
                    records_parsed: row.get::<_, i64>(5)? as u64,
                    emails_found: row.get::<_, i64>(6)? as u64,
                    email_pct: row.get(7)?,
                    heavy_fetches: row.get::<_, i64>(8)? as u64,
                    heavy_pct: row.get(9)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(metrics)
    }

    // ===== Statistics =====

    fn count_raw_pages(&self) -> StorageResult<u64> {
        self.count("SELECT COUNT(*) FROM raw_pages")
    }

    fn count_raw_pages_by_method(&self, method: FetchMethod) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM raw_pages WHERE fetch_method = ?1",
            params![method.to_db_string()],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn count_records(&self) -> StorageResult<u64> {
        self.count("SELECT COUNT(*) FROM records")
    }

    fn count_records_with_email(&self) -> StorageResult<u64> {
        self.count("SELECT COUNT(*) FROM records WHERE email IS NOT NULL AND email != ''")
    }

    fn count_records_by_source(&self) -> StorageResult<Vec<(String, u64)>> {
        let mut stmt = self.conn.prepare(
            "SELECT COALESCE(source_id, ''), COUNT(*) FROM records GROUP BY source_id ORDER BY source_id",
        )?;

        let counts = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get::<_, i64>(1)? as u64)))?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(counts)
    }

    fn count_runs(&self) -> StorageResult<u64> {
        self.count("SELECT COUNT(*) FROM harvest_runs")
    }
}

/// Opens a database file and brings its schema up to date
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
///
/// # Returns
///
/// * `Ok(Connection)` - Successfully opened/created database
/// * `Err(rusqlite::Error)` - Failed to open database
pub fn init_database(path: &Path) -> Result<Connection, rusqlite::Error> {
    let conn = Connection::open(path)?;

    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA foreign_keys = ON;
    ",
    )?;

    initialize_schema(&conn)?;

    Ok(conn)
}

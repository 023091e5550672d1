//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::harvest::{FetchMethod, NormalizedRecord, RawCapture};
use crate::output::{RunTotals, SourceMetrics};
use crate::storage::{RunRecord, RunStatus};
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Run not found: {0}")]
    RunNotFound(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// This trait defines all database operations needed by the harvester.
pub trait Storage {
    // ===== Run Management =====

    /// Records the start of a harvest run
    fn create_run(&mut self, run_id: &str, config_hash: &str) -> StorageResult<()>;

    /// Gets a run by ID
    fn get_run(&self, run_id: &str) -> StorageResult<RunRecord>;

    /// Gets the most recently started run
    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>>;

    /// Stamps the finish time, final status and totals on a run
    fn finish_run(&mut self, run_id: &str, status: RunStatus, totals: &RunTotals)
        -> StorageResult<()>;

    // ===== Harvest Results =====

    /// Archives raw captures
    ///
    /// A URL already captured in the same run is left untouched.
    ///
    /// # Returns
    ///
    /// The number of rows actually inserted
    fn insert_raw_pages(&mut self, captures: &[RawCapture]) -> StorageResult<usize>;

    /// Inserts records, replacing any existing record with the same URL
    fn upsert_records(
        &mut self,
        records: &[NormalizedRecord],
        harvested_at: DateTime<Utc>,
    ) -> StorageResult<usize>;

    /// Gets the stored record for a profile URL
    fn get_record(&self, url: &str) -> StorageResult<Option<NormalizedRecord>>;

    // ===== Metrics =====

    /// Stores the metrics of one source within a run
    fn insert_source_metrics(&mut self, run_id: &str, metrics: &SourceMetrics)
        -> StorageResult<()>;

    /// Gets all per-source metrics recorded for a run, ordered by source id
    fn get_source_metrics(&self, run_id: &str) -> StorageResult<Vec<SourceMetrics>>;

    // ===== Statistics =====

    /// Gets total archived page count
    fn count_raw_pages(&self) -> StorageResult<u64>;

    /// Gets archived page count for one fetch method
    fn count_raw_pages_by_method(&self, method: FetchMethod) -> StorageResult<u64>;

    /// Gets total record count
    fn count_records(&self) -> StorageResult<u64>;

    /// Gets the number of records that carry an email
    fn count_records_with_email(&self) -> StorageResult<u64>;

    /// Gets record counts per source, ordered by source id
    fn count_records_by_source(&self) -> StorageResult<Vec<(String, u64)>>;

    /// Gets the number of runs recorded
    fn count_runs(&self) -> StorageResult<u64>;
}

//! Statistics generation from the harvest database
//!
//! This module provides functionality for extracting and displaying
//! harvest statistics from the storage layer.

use crate::harvest::FetchMethod;
use crate::output::metrics::{ratio, SourceMetrics};
use crate::storage::{RunRecord, Storage, StorageResult};

/// Harvest statistics summary
#[derive(Debug, Clone)]
pub struct HarvestStatistics {
    /// Number of runs recorded
    pub total_runs: u64,

    /// Archived pages across all runs
    pub raw_pages: u64,

    /// Archived pages obtained through the browser
    pub heavy_pages: u64,

    /// Distinct profile records
    pub total_records: u64,

    /// Records carrying an email address
    pub records_with_email: u64,

    /// Record count per source
    pub records_by_source: Vec<(String, u64)>,

    /// The most recent run and its per-source metrics
    pub latest_run: Option<(RunRecord, Vec<SourceMetrics>)>,
}

/// Loads statistics from storage
///
/// # Arguments
///
/// * `storage` - The storage backend to query
///
/// # Returns
///
/// * `Ok(HarvestStatistics)` - Successfully loaded statistics
/// * `Err(StorageError)` - Failed to query statistics
pub fn load_statistics(storage: &dyn Storage) -> StorageResult<HarvestStatistics> {
    let latest_run = match storage.get_latest_run()? {
        Some(run) => {
            let metrics = storage.get_source_metrics(&run.run_id)?;
            Some((run, metrics))
        }
        None => None,
    };

    Ok(HarvestStatistics {
        total_runs: storage.count_runs()?,
        raw_pages: storage.count_raw_pages()?,
        heavy_pages: storage.count_raw_pages_by_method(FetchMethod::Heavy)?,
        total_records: storage.count_records()?,
        records_with_email: storage.count_records_with_email()?,
        records_by_source: storage.count_records_by_source()?,
        latest_run,
    })
}

/// Prints one line of per-source metrics
pub fn print_source_metrics(metrics: &SourceMetrics) {
    println!(
        "  {:<14} urls: {:>4}  fetched: {:>4}  failed: {:>4} ({:.1}%)  emails: {:>4} ({:.1}%)  browser: {:>4} ({:.1}%)",
        metrics.source_id,
        metrics.total_urls,
        metrics.pages_fetched,
        metrics.parse_failures,
        metrics.failed_pct * 100.0,
        metrics.emails_found,
        metrics.email_pct * 100.0,
        metrics.heavy_fetches,
        metrics.heavy_pct * 100.0,
    );
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_statistics(stats: &HarvestStatistics) {
    println!("=== Harvest Statistics ===\n");

    println!("Overview:");
    println!("  Runs recorded: {}", stats.total_runs);
    println!(
        "  Pages archived: {} ({:.1}% via browser)",
        stats.raw_pages,
        ratio(stats.heavy_pages, stats.raw_pages) * 100.0
    );
    println!("  Profile records: {}", stats.total_records);
    println!(
        "  Records with email: {} ({:.1}%)",
        stats.records_with_email,
        ratio(stats.records_with_email, stats.total_records) * 100.0
    );
    println!();

    if !stats.records_by_source.is_empty() {
        println!("Records by Source:");
        for (source_id, count) in &stats.records_by_source {
            println!("  {}: {}", source_id, count);
        }
        println!();
    }

    match &stats.latest_run {
        Some((run, metrics)) => {
            println!("Latest Run: {}", run.run_id);
            println!("  Status: {}", run.status.to_db_string());
            println!("  Started: {}", run.started_at);
            if let Some(finished) = &run.finished_at {
                println!("  Finished: {}", finished);
            }
            println!(
                "  Pages fetched: {}  Records: {}  Failures: {}  Emails: {}",
                run.pages_fetched, run.records_parsed, run.parse_failures, run.emails_found
            );
            for m in metrics {
                print_source_metrics(m);
            }
        }
        None => println!("No harvest runs recorded yet."),
    }
}

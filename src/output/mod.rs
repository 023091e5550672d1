//! Output module for harvest metrics and reports
//!
//! This module handles:
//! - Computing per-source and per-run quality metrics
//! - Summarizing a finished run on stdout
//! - Loading and printing statistics from the database

mod metrics;
pub mod stats;

pub use metrics::{ratio, RunTotals, SourceMetrics};
pub use stats::{load_statistics, print_source_metrics, print_statistics, HarvestStatistics};

/// Prints the summary of a run that just finished
///
/// # Arguments
///
/// * `run_id` - The run identifier
/// * `sources` - Metrics of every source harvested in the run
/// * `failed_sources` - Sources that produced no output, with the reason
pub fn print_run_summary(
    run_id: &str,
    sources: &[SourceMetrics],
    failed_sources: &[(String, String)],
) {
    let totals = RunTotals::from_sources(sources);

    println!("=== Harvest Run {} ===\n", run_id);
    for m in sources {
        print_source_metrics(m);
    }
    if !failed_sources.is_empty() {
        println!();
        println!("Failed Sources:");
        for (source_id, reason) in failed_sources {
            println!("  {}: {}", source_id, reason);
        }
    }
    println!();
    println!(
        "Totals: {} pages fetched, {} records, {} failures, {} emails",
        totals.pages_fetched, totals.records_parsed, totals.parse_failures, totals.emails_found
    );
}

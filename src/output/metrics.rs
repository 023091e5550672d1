//! Quality metrics for a harvested source and for a whole run

use crate::harvest::HarvestOutput;

/// `numerator / denominator`, or 0.0 when there is nothing to divide by
pub fn ratio(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

/// Metrics of one source within one run
#[derive(Debug, Clone, PartialEq)]
pub struct SourceMetrics {
    pub source_id: String,

    /// Distinct profile URLs attempted
    pub total_urls: u64,

    /// Pages whose HTML was obtained by either tier
    pub pages_fetched: u64,

    /// URLs that produced no record
    pub parse_failures: u64,

    /// `parse_failures / total_urls`
    pub failed_pct: f64,

    pub records_parsed: u64,

    pub emails_found: u64,

    /// `emails_found / records_parsed`
    pub email_pct: f64,

    /// Pages obtained through the browser
    pub heavy_fetches: u64,

    /// `heavy_fetches / pages_fetched`
    pub heavy_pct: f64,
}

impl SourceMetrics {
    pub fn from_output(source_id: &str, output: &HarvestOutput) -> Self {
        let total_urls = output.total_urls as u64;
        let pages_fetched = output.metrics.pages_fetched;
        let parse_failures = output.metrics.parse_failures;
        let records_parsed = output.records.len() as u64;
        let emails_found = output.records.iter().filter(|r| r.has_email()).count() as u64;
        let heavy_fetches = output.metrics.heavy_fetches;

        Self {
            source_id: source_id.to_string(),
            total_urls,
            pages_fetched,
            parse_failures,
            failed_pct: ratio(parse_failures, total_urls),
            records_parsed,
            emails_found,
            email_pct: ratio(emails_found, records_parsed),
            heavy_fetches,
            heavy_pct: ratio(heavy_fetches, pages_fetched),
        }
    }
}

/// Totals stored on a run, summed over its sources
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunTotals {
    pub pages_fetched: u64,
    pub records_parsed: u64,
    pub parse_failures: u64,
    pub emails_found: u64,
}

impl RunTotals {
    pub fn from_sources(sources: &[SourceMetrics]) -> Self {
        sources.iter().fold(Self::default(), |acc, m| Self {
            pages_fetched: acc.pages_fetched + m.pages_fetched,
            records_parsed: acc.records_parsed + m.records_parsed,
            parse_failures: acc.parse_failures + m.parse_failures,
            emails_found: acc.emails_found + m.emails_found,
        })
    }
}

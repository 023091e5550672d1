//! Data produced by a harvest run

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

use crate::harvest::normalize::NormalizedRecord;
use crate::harvest::MetricsSnapshot;

/// Fetch tier that produced a page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchMethod {
    /// Plain HTTP request, no script execution
    Light,
    /// Full browser render
    Heavy,
}

impl FetchMethod {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Heavy => "heavy",
        }
    }
}

impl fmt::Display for FetchMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_db_string())
    }
}

/// HTML returned by a successful fetch
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub html: String,
    pub method: FetchMethod,
}

/// Lossless archive entry for one fetched page
#[derive(Debug, Clone)]
pub struct RawCapture {
    pub run_id: String,
    pub source_id: String,
    pub url: String,
    pub html: String,
    pub fetch_method: FetchMethod,
    pub captured_at: DateTime<Utc>,
}

/// Everything a run produced
///
/// Captures and records are in completion order, not input order.
#[derive(Debug, Clone, Default)]
pub struct HarvestOutput {
    pub raw_captures: Vec<RawCapture>,
    pub records: Vec<NormalizedRecord>,
    /// URLs that yielded no record, with the cause
    pub failures: Vec<(String, String)>,
    /// Number of distinct URLs the run was given
    pub total_urls: usize,
    pub metrics: MetricsSnapshot,
}

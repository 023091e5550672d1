//! Per-run harvest counters
//!
//! The counters are shared by every task of a run and only ever grow. Fetch
//! counters are bumped by the escalator, the failure counter by the
//! orchestrator; everyone else reads a [`MetricsSnapshot`].

use crate::harvest::FetchMethod;
use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic counters scoped to a single harvest run
#[derive(Debug, Default)]
pub struct MetricsCounters {
    pages_fetched: AtomicU64,
    light_fetches: AtomicU64,
    heavy_fetches: AtomicU64,
    parse_failures: AtomicU64,
}

/// Point-in-time copy of [`MetricsCounters`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Pages fetched successfully by either tier
    pub pages_fetched: u64,

    /// Pages served by the plain HTTP tier
    pub light_fetches: u64,

    /// Pages served by the browser tier
    pub heavy_fetches: u64,

    /// URLs that failed anywhere in fetch or parse
    pub parse_failures: u64,
}

impl MetricsCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one successful fetch served by `method`
    pub(crate) fn record_fetch(&self, method: FetchMethod) {
        self.pages_fetched.fetch_add(1, Ordering::Relaxed);
        match method {
            FetchMethod::Light => self.light_fetches.fetch_add(1, Ordering::Relaxed),
            FetchMethod::Heavy => self.heavy_fetches.fetch_add(1, Ordering::Relaxed),
        };
    }

    /// Records one URL that yielded no normalized record
    pub(crate) fn record_failure(&self) {
        self.parse_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn pages_fetched(&self) -> u64 {
        self.pages_fetched.load(Ordering::Relaxed)
    }

    pub fn light_fetches(&self) -> u64 {
        self.light_fetches.load(Ordering::Relaxed)
    }

    pub fn heavy_fetches(&self) -> u64 {
        self.heavy_fetches.load(Ordering::Relaxed)
    }

    pub fn parse_failures(&self) -> u64 {
        self.parse_failures.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            pages_fetched: self.pages_fetched(),
            light_fetches: self.light_fetches(),
            heavy_fetches: self.heavy_fetches(),
            parse_failures: self.parse_failures(),
        }
    }
}

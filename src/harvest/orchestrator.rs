//! Harvest orchestrator - fan-out/fan-in over a list of profile URLs
//!
//! This module contains the per-run orchestration logic:
//! - One task per distinct URL, all running concurrently
//! - Fetch, archive, parse and normalize inside each task
//! - Per-URL failure containment and counting
//! - Guaranteed shutdown of the shared renderer when the run ends

use chrono::Utc;
use std::collections::HashSet;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use crate::harvest::escalator::PageFetcher;
use crate::harvest::normalize::normalize;
use crate::harvest::parser::{ParseError, ProfileParser};
use crate::harvest::renderer::HeavyRenderer;
use crate::harvest::{HarvestOutput, NormalizedRecord, RawCapture, RunState};
use crate::HarvestError;

/// What a single URL's task produced
struct TaskOutcome {
    capture: Option<RawCapture>,
    record: Result<NormalizedRecord, String>,
}

impl TaskOutcome {
    fn failed(cause: String) -> Self {
        Self {
            capture: None,
            record: Err(cause),
        }
    }
}

/// Runs harvests against the resources of one [`RunState`]
pub struct HarvestOrchestrator {
    state: Arc<RunState>,
}

impl HarvestOrchestrator {
    pub fn new(state: Arc<RunState>) -> Self {
        Self { state }
    }

    /// Harvests every URL in `urls`
    ///
    /// For each distinct URL this:
    /// 1. Fetches the page through `fetcher`
    /// 2. Archives the HTML as a [`RawCapture`]
    /// 3. Parses it with `parser` and normalizes the result
    ///
    /// A failure at any step only affects its own URL: it is logged, counted
    /// once, and listed in [`HarvestOutput::failures`]. The shared renderer is
    /// shut down before this returns, and also if the returned future is
    /// dropped early.
    ///
    /// # Returns
    ///
    /// * `Ok(HarvestOutput)` - All tasks finished
    /// * `Err(HarvestError::RendererUnavailable)` - The browser never started;
    ///   every task still ran and the partial output is attached
    pub async fn run(
        &self,
        urls: Vec<String>,
        fetcher: Arc<dyn PageFetcher>,
        parser: Arc<dyn ProfileParser>,
        source_id: &str,
        run_id: &str,
    ) -> Result<HarvestOutput, HarvestError> {
        let guard = ShutdownGuard::new(self.state.renderer().clone());
        let targets = distinct(urls);
        let start_time = std::time::Instant::now();

        tracing::info!(
            "Harvesting {} URLs for source '{}' (run {})",
            targets.len(),
            source_id,
            run_id
        );

        let source_id: Arc<str> = Arc::from(source_id);
        let run_id: Arc<str> = Arc::from(run_id);

        let mut handles = Vec::with_capacity(targets.len());
        for url in targets {
            let fetcher = fetcher.clone();
            let parser = parser.clone();
            let source_id = source_id.clone();
            let run_id = run_id.clone();
            let task_url = url.clone();

            let handle = tokio::spawn(async move {
                harvest_one(
                    &task_url,
                    fetcher.as_ref(),
                    parser.as_ref(),
                    &source_id,
                    &run_id,
                )
                .await
            });
            handles.push((url, handle));
        }

        let mut output = HarvestOutput {
            total_urls: handles.len(),
            ..Default::default()
        };

        for (url, handle) in handles {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(e) => TaskOutcome::failed(format!("task aborted: {}", e)),
            };

            if let Some(capture) = outcome.capture {
                output.raw_captures.push(capture);
            }

            match outcome.record {
                Ok(record) => output.records.push(record),
                Err(cause) => {
                    self.state.metrics().record_failure();
                    tracing::warn!("[{}] failure on {}: {}", source_id, url, cause);
                    output.failures.push((url, cause));
                }
            }
        }

        let startup_failure = self.state.renderer().startup_failure().await;
        guard.shutdown().await;
        output.metrics = self.state.metrics().snapshot();

        tracing::info!(
            "Source '{}' done in {:?}: {} captures, {} records, {} failures",
            source_id,
            start_time.elapsed(),
            output.raw_captures.len(),
            output.records.len(),
            output.failures.len()
        );

        if let Some(reason) = startup_failure {
            return Err(HarvestError::RendererUnavailable {
                source_id: source_id.to_string(),
                reason,
                partial: Box::new(output),
            });
        }

        Ok(output)
    }
}

/// Fetches, archives, parses and normalizes one URL
async fn harvest_one(
    url: &str,
    fetcher: &dyn PageFetcher,
    parser: &dyn ProfileParser,
    source_id: &str,
    run_id: &str,
) -> TaskOutcome {
    let page = match fetcher.fetch(url).await {
        Ok(page) => page,
        Err(e) => return TaskOutcome::failed(format!("fetch: {}", e)),
    };

    let capture = RawCapture {
        run_id: run_id.to_string(),
        source_id: source_id.to_string(),
        url: url.to_string(),
        html: page.html,
        fetch_method: page.method,
        captured_at: Utc::now(),
    };

    let record = parse_guarded(parser, &capture.html, url)
        .map(|partial| normalize(url, &partial.with_source(source_id)))
        .map_err(|e| format!("parse: {}", e));

    TaskOutcome {
        capture: Some(capture),
        record,
    }
}

/// Runs the parser, turning a panic into a parse error so the capture survives
fn parse_guarded(
    parser: &dyn ProfileParser,
    html: &str,
    url: &str,
) -> Result<crate::harvest::PartialRecord, ParseError> {
    match catch_unwind(AssertUnwindSafe(|| parser.parse(html, url))) {
        Ok(result) => result,
        Err(panic) => {
            let message = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            Err(ParseError::Panicked {
                url: url.to_string(),
                message,
            })
        }
    }
}

/// Drops repeated URLs, keeping the first occurrence
fn distinct(urls: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::with_capacity(urls.len());
    let before = urls.len();
    let targets: Vec<String> = urls
        .into_iter()
        .filter(|url| seen.insert(url.clone()))
        .collect();
    if targets.len() < before {
        tracing::debug!("Collapsed {} duplicate URLs", before - targets.len());
    }
    targets
}

/// Shuts the renderer down when a run ends, however it ends
///
/// [`ShutdownGuard::shutdown`] is the normal path. If the guard is dropped
/// while still armed, shutdown is handed to a background task.
struct ShutdownGuard {
    renderer: Option<Arc<HeavyRenderer>>,
}

impl ShutdownGuard {
    fn new(renderer: Arc<HeavyRenderer>) -> Self {
        Self {
            renderer: Some(renderer),
        }
    }

    async fn shutdown(mut self) {
        if let Some(renderer) = self.renderer.take() {
            renderer.shutdown().await;
        }
    }
}

impl Drop for ShutdownGuard {
    fn drop(&mut self) {
        if let Some(renderer) = self.renderer.take() {
            if let Ok(handle) = tokio::runtime::Handle::try_current() {
                handle.spawn(async move { renderer.shutdown().await });
            }
        }
    }
}

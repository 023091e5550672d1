//! Harvest module: the concurrent fetch/parse pipeline
//!
//! This module contains the core harvesting logic, including:
//! - Two-tier admission control (plain HTTP vs. browser)
//! - Light fetches with bot-challenge detection
//! - Escalation to a shared headless browser
//! - Per-URL fan-out with failure containment
//! - Normalization of parser output into a fixed schema

pub mod chromium;
mod escalator;
mod fetcher;
mod governor;
mod metrics;
mod normalize;
mod orchestrator;
mod parser;
mod renderer;
mod run_state;
mod types;

pub use escalator::{FetchError, FetchEscalator, PageFetcher};
pub use fetcher::{build_http_client, fetch_light, BlockDetector, LightOutcome, MarkerBlockDetector};
pub use governor::{ConcurrencyGovernor, Tier, TierPermit};
pub use metrics::{MetricsCounters, MetricsSnapshot};
pub use normalize::{normalize, NormalizedRecord, PartialRecord, CANONICAL_FIELDS};
pub use orchestrator::HarvestOrchestrator;
pub use parser::{ParseError, ProfileParser};
pub use renderer::{
    BrowserContext, BrowserEngine, BrowserLauncher, HeavyRenderer, RenderError, RenderTimeouts,
};
pub use run_state::RunState;
pub use types::{FetchMethod, FetchedPage, HarvestOutput, RawCapture};

use reqwest::Client;
use std::sync::Arc;

use crate::sources::{Source, SourceParser};
use crate::HarvestError;

/// Discovers and harvests one source inside `state`
///
/// Directory pages fetched during discovery share the run's admission pools
/// and browser but are not counted in the run's metrics. The renderer is shut
/// down on every path, including a failed discovery.
///
/// # Arguments
///
/// * `source` - The directory site to harvest
/// * `state` - Fresh resources for this run
/// * `client` - Shared HTTP client for the light tier
/// * `detector` - Bot-challenge predicate for light responses
/// * `readiness_selector` - Overrides the source's own readiness selector
/// * `run_id` - Identifier stamped on every capture
pub async fn harvest_source(
    source: Arc<dyn Source>,
    state: Arc<RunState>,
    client: Client,
    detector: Arc<dyn BlockDetector>,
    readiness_selector: Option<String>,
    run_id: &str,
) -> Result<HarvestOutput, HarvestError> {
    let directory_fetcher = state.escalator_with_metrics(
        client.clone(),
        detector.clone(),
        Arc::new(MetricsCounters::new()),
    );

    let urls = match source.discover(&directory_fetcher).await {
        Ok(urls) => urls,
        Err(e) => {
            state.shutdown().await;
            return Err(HarvestError::Discovery {
                source_id: source.id().to_string(),
                message: e.to_string(),
            });
        }
    };
    tracing::info!(
        "Discovered {} profile URLs for '{}'",
        urls.len(),
        source.id()
    );

    let readiness_selector =
        readiness_selector.or_else(|| source.readiness_selector().map(str::to_string));
    let fetcher: Arc<dyn PageFetcher> = Arc::new(
        state
            .escalator(client, detector)
            .with_readiness_selector(readiness_selector),
    );
    let parser: Arc<dyn ProfileParser> = Arc::new(SourceParser::new(source.clone()));

    HarvestOrchestrator::new(state)
        .run(urls, fetcher, parser, source.id(), run_id)
        .await
}

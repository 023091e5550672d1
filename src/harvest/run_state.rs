//! Resources owned by one harvest run

use reqwest::Client;
use std::sync::Arc;

use crate::config::HarvesterConfig;
use crate::harvest::escalator::FetchEscalator;
use crate::harvest::fetcher::BlockDetector;
use crate::harvest::governor::ConcurrencyGovernor;
use crate::harvest::renderer::{BrowserLauncher, HeavyRenderer, RenderTimeouts};
use crate::harvest::MetricsCounters;

/// Counters, admission pools and the shared renderer of a single run
///
/// A new run needs a new `RunState`; nothing in here is reset.
pub struct RunState {
    metrics: Arc<MetricsCounters>,
    governor: Arc<ConcurrencyGovernor>,
    renderer: Arc<HeavyRenderer>,
    config: HarvesterConfig,
}

impl RunState {
    pub fn new(config: &HarvesterConfig, launcher: Arc<dyn BrowserLauncher>) -> Self {
        let renderer = HeavyRenderer::new(
            launcher,
            RenderTimeouts {
                navigation: config.heavy_timeout(),
                readiness: config.readiness_timeout(),
            },
        );
        Self {
            metrics: Arc::new(MetricsCounters::new()),
            governor: Arc::new(ConcurrencyGovernor::new(
                config.light_concurrency as usize,
                config.heavy_concurrency as usize,
            )),
            renderer: Arc::new(renderer),
            config: config.clone(),
        }
    }

    pub fn metrics(&self) -> &Arc<MetricsCounters> {
        &self.metrics
    }

    pub fn governor(&self) -> &Arc<ConcurrencyGovernor> {
        &self.governor
    }

    pub fn renderer(&self) -> &Arc<HeavyRenderer> {
        &self.renderer
    }

    /// Escalating fetcher that reports into this run's counters
    pub fn escalator(&self, client: Client, detector: Arc<dyn BlockDetector>) -> FetchEscalator {
        self.escalator_with_metrics(client, detector, self.metrics.clone())
    }

    /// Escalating fetcher sharing this run's pools and renderer but counting
    /// into `metrics` (used for directory pages during discovery)
    pub fn escalator_with_metrics(
        &self,
        client: Client,
        detector: Arc<dyn BlockDetector>,
        metrics: Arc<MetricsCounters>,
    ) -> FetchEscalator {
        FetchEscalator::new(
            client,
            self.governor.clone(),
            self.renderer.clone(),
            metrics,
            detector,
            self.config.light_timeout(),
        )
    }

    /// Forces the shared renderer down
    pub async fn shutdown(&self) {
        self.renderer.shutdown().await;
    }
}

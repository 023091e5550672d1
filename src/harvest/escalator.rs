//! Two-tier fetch with escalation
//!
//! Every URL is tried once over plain HTTP. If that attempt is blocked or
//! fails, the URL is rendered once in the shared browser. A browser failure
//! is final for the URL.

use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::harvest::fetcher::{fetch_light, BlockDetector, LightOutcome};
use crate::harvest::governor::{ConcurrencyGovernor, Tier};
use crate::harvest::renderer::{HeavyRenderer, RenderError};
use crate::harvest::{FetchMethod, FetchedPage, MetricsCounters};

/// Errors that end a fetch for one URL
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    #[error("{0} admission pool is closed")]
    GovernorClosed(Tier),

    #[error("Heavy fetch failed: {0}")]
    Heavy(#[from] RenderError),
}

/// Anything that can turn a URL into page HTML
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError>;
}

/// Light-then-heavy fetcher used by the orchestrator and by source discovery
pub struct FetchEscalator {
    client: Client,
    governor: Arc<ConcurrencyGovernor>,
    renderer: Arc<HeavyRenderer>,
    metrics: Arc<MetricsCounters>,
    detector: Arc<dyn BlockDetector>,
    light_timeout: Duration,
    readiness_selector: Option<String>,
}

impl FetchEscalator {
    pub fn new(
        client: Client,
        governor: Arc<ConcurrencyGovernor>,
        renderer: Arc<HeavyRenderer>,
        metrics: Arc<MetricsCounters>,
        detector: Arc<dyn BlockDetector>,
        light_timeout: Duration,
    ) -> Self {
        Self {
            client,
            governor,
            renderer,
            metrics,
            detector,
            light_timeout,
            readiness_selector: None,
        }
    }

    /// Makes heavy fetches wait for `selector` before extracting the page
    pub fn with_readiness_selector(mut self, selector: Option<String>) -> Self {
        self.readiness_selector = selector;
        self
    }

    /// Runs the light tier under a light permit
    async fn try_light(&self, url: &str) -> Result<LightOutcome, FetchError> {
        let permit = self.governor.acquire(Tier::Light).await?;
        let outcome = fetch_light(&self.client, url, self.light_timeout, self.detector.as_ref()).await;
        permit.release();
        Ok(outcome)
    }

    /// Runs the heavy tier under a heavy permit
    async fn try_heavy(&self, url: &str) -> Result<String, FetchError> {
        let permit = self.governor.acquire(Tier::Heavy).await?;
        let html = self
            .renderer
            .render(url, self.readiness_selector.as_deref())
            .await;
        permit.release();
        Ok(html?)
    }
}

#[async_trait]
impl PageFetcher for FetchEscalator {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError> {
        let outcome = self.try_light(url).await?;

        if !outcome.should_escalate() {
            if let LightOutcome::Success { body, .. } = outcome {
                self.metrics.record_fetch(FetchMethod::Light);
                return Ok(FetchedPage {
                    html: body,
                    method: FetchMethod::Light,
                });
            }
        }

        tracing::debug!("Escalating {} to browser: {}", url, outcome);

        let html = self.try_heavy(url).await?;
        self.metrics.record_fetch(FetchMethod::Heavy);
        Ok(FetchedPage {
            html,
            method: FetchMethod::Heavy,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::UserAgentConfig;
    use crate::harvest::fetcher::{build_http_client, MarkerBlockDetector};
    use crate::harvest::renderer::{BrowserContext, BrowserEngine, BrowserLauncher, RenderTimeouts};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct ScriptedLauncher {
        renders: Arc<AtomicUsize>,
        fail_render: bool,
    }

    struct ScriptedEngine {
        renders: Arc<AtomicUsize>,
        fail_render: bool,
    }

    struct ScriptedContext {
        renders: Arc<AtomicUsize>,
        fail_render: bool,
    }

    #[async_trait]
    impl BrowserLauncher for ScriptedLauncher {
        async fn launch(&self) -> Result<Arc<dyn BrowserEngine>, RenderError> {
            Ok(Arc::new(ScriptedEngine {
                renders: self.renders.clone(),
                fail_render: self.fail_render,
            }))
        }
    }

    #[async_trait]
    impl BrowserEngine for ScriptedEngine {
        async fn new_context(&self) -> Result<Box<dyn BrowserContext>, RenderError> {
            Ok(Box::new(ScriptedContext {
                renders: self.renders.clone(),
                fail_render: self.fail_render,
            }))
        }

        async fn close(&self) -> Result<(), RenderError> {
            Ok(())
        }
    }

    #[async_trait]
    impl BrowserContext for ScriptedContext {
        async fn navigate(&mut self, url: &str) -> Result<(), RenderError> {
            self.renders.fetch_add(1, Ordering::SeqCst);
            if self.fail_render {
                return Err(RenderError::Navigation {
                    url: url.to_string(),
                    message: "net::ERR_CONNECTION_RESET".to_string(),
                });
            }
            Ok(())
        }

        async fn wait_for_selector(&self, _selector: &str) -> Result<(), RenderError> {
            Ok(())
        }

        async fn content(&self) -> Result<String, RenderError> {
            Ok("<h1>Rendered</h1>".to_string())
        }

        async fn close(self: Box<Self>) -> Result<(), RenderError> {
            Ok(())
        }
    }

    struct Fixture {
        escalator: FetchEscalator,
        renders: Arc<AtomicUsize>,
        metrics: Arc<MetricsCounters>,
    }

    fn fixture(fail_render: bool) -> Fixture {
        let renders = Arc::new(AtomicUsize::new(0));
        let metrics = Arc::new(MetricsCounters::new());
        let renderer = Arc::new(HeavyRenderer::new(
            Arc::new(ScriptedLauncher {
                renders: renders.clone(),
                fail_render,
            }),
            RenderTimeouts::default(),
        ));
        let escalator = FetchEscalator::new(
            build_http_client(&UserAgentConfig::default()).unwrap(),
            Arc::new(ConcurrencyGovernor::new(4, 2)),
            renderer,
            metrics.clone(),
            Arc::new(MarkerBlockDetector::default()),
            Duration::from_millis(300),
        );
        Fixture {
            escalator,
            renders,
            metrics,
        }
    }

    #[tokio::test]
    async fn test_clean_page_stays_light() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<h1>Plain</h1>"))
            .mount(&server)
            .await;

        let fx = fixture(false);
        let page = fx.escalator.fetch(&server.uri()).await.unwrap();

        assert_eq!(page.method, FetchMethod::Light);
        assert_eq!(page.html, "<h1>Plain</h1>");
        assert_eq!(fx.renders.load(Ordering::SeqCst), 0);

        let snap = fx.metrics.snapshot();
        assert_eq!(snap.pages_fetched, 1);
        assert_eq!(snap.light_fetches, 1);
        assert_eq!(snap.heavy_fetches, 0);
    }

    #[tokio::test]
    async fn test_blocked_page_escalates_exactly_once() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string("<title>Just a moment...</title>"),
            )
            .mount(&server)
            .await;

        let fx = fixture(false);
        let page = fx.escalator.fetch(&server.uri()).await.unwrap();

        assert_eq!(page.method, FetchMethod::Heavy);
        assert_eq!(page.html, "<h1>Rendered</h1>");
        assert_eq!(fx.renders.load(Ordering::SeqCst), 1);

        let snap = fx.metrics.snapshot();
        assert_eq!(snap.pages_fetched, 1);
        assert_eq!(snap.heavy_fetches, 1);
        assert_eq!(snap.light_fetches, 0);
    }

    #[tokio::test]
    async fn test_timeout_escalates() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("late")
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&server)
            .await;

        let fx = fixture(false);
        let page = fx.escalator.fetch(&server.uri()).await.unwrap();
        assert_eq!(page.method, FetchMethod::Heavy);
    }

    #[tokio::test]
    async fn test_heavy_failure_is_terminal_and_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let fx = fixture(true);
        let result = fx.escalator.fetch(&server.uri()).await;

        assert!(matches!(result, Err(FetchError::Heavy(_))));
        assert_eq!(fx.renders.load(Ordering::SeqCst), 1);
        assert_eq!(fx.metrics.snapshot().pages_fetched, 0);
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            FetchError::GovernorClosed(Tier::Heavy).to_string(),
            "heavy admission pool is closed"
        );
        let heavy = FetchError::from(RenderError::ShutDown);
        assert_eq!(heavy.to_string(), "Heavy fetch failed: Renderer already shut down");
    }
}

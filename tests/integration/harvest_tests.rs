//! Integration tests for the harvester
//!
//! These tests use wiremock for the plain HTTP tier and a scripted in-process
//! browser for the heavy tier, and drive whole harvests end-to-end.

use async_trait::async_trait;
use chrono::Utc;
use faculty_harvest::config::{HarvesterConfig, UserAgentConfig};
use faculty_harvest::harvest::{
    build_http_client, harvest_source, BlockDetector, BrowserContext, BrowserEngine,
    BrowserLauncher, FetchMethod, HarvestOrchestrator, MarkerBlockDetector, PageFetcher,
    ParseError, PartialRecord, ProfileParser, RenderError, RunState,
};
use faculty_harvest::output::{RunTotals, SourceMetrics};
use faculty_harvest::sources::{build_source, DataScienceSource, SourceParser};
use faculty_harvest::storage::{RunStatus, SqliteStorage, Storage};
use faculty_harvest::HarvestError;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const CHALLENGE_PAGE: &str = "<html><title>Just a moment...</title></html>";

/// Counters shared by the scripted browser and the test body
#[derive(Default)]
struct Tally {
    launches: AtomicUsize,
    closes: AtomicUsize,
    renders: AtomicUsize,
    active_contexts: AtomicUsize,
    peak_contexts: AtomicUsize,
}

#[derive(Clone)]
struct Script {
    fail_launch: bool,
    fail_render: bool,
    render_delay: Duration,
    html: String,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            fail_launch: false,
            fail_render: false,
            render_delay: Duration::ZERO,
            html: "<h1>Bob</h1>".to_string(),
        }
    }
}

struct ScriptedLauncher {
    tally: Arc<Tally>,
    script: Script,
}

struct ScriptedEngine {
    tally: Arc<Tally>,
    script: Script,
}

struct ScriptedContext {
    tally: Arc<Tally>,
    script: Script,
}

#[async_trait]
impl BrowserLauncher for ScriptedLauncher {
    async fn launch(&self) -> Result<Arc<dyn BrowserEngine>, RenderError> {
        self.tally.launches.fetch_add(1, Ordering::SeqCst);
        if self.script.fail_launch {
            return Err(RenderError::Launch("no chrome binary found".to_string()));
        }
        Ok(Arc::new(ScriptedEngine {
            tally: self.tally.clone(),
            script: self.script.clone(),
        }))
    }
}

#[async_trait]
impl BrowserEngine for ScriptedEngine {
    async fn new_context(&self) -> Result<Box<dyn BrowserContext>, RenderError> {
        let active = self.tally.active_contexts.fetch_add(1, Ordering::SeqCst) + 1;
        self.tally.peak_contexts.fetch_max(active, Ordering::SeqCst);
        Ok(Box::new(ScriptedContext {
            tally: self.tally.clone(),
            script: self.script.clone(),
        }))
    }

    async fn close(&self) -> Result<(), RenderError> {
        self.tally.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl BrowserContext for ScriptedContext {
    async fn navigate(&mut self, url: &str) -> Result<(), RenderError> {
        self.tally.renders.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.script.render_delay).await;
        if self.script.fail_render {
            return Err(RenderError::Navigation {
                url: url.to_string(),
                message: "net::ERR_NAME_NOT_RESOLVED".to_string(),
            });
        }
        Ok(())
    }

    async fn wait_for_selector(&self, _selector: &str) -> Result<(), RenderError> {
        Ok(())
    }

    async fn content(&self) -> Result<String, RenderError> {
        Ok(self.script.html.clone())
    }

    async fn close(self: Box<Self>) -> Result<(), RenderError> {
        self.tally.active_contexts.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }
}

struct Harness {
    state: Arc<RunState>,
    fetcher: Arc<dyn PageFetcher>,
    tally: Arc<Tally>,
}

fn harvester_config(light: u32, heavy: u32) -> HarvesterConfig {
    HarvesterConfig {
        light_concurrency: light,
        heavy_concurrency: heavy,
        light_timeout_secs: 1,
        heavy_timeout_secs: 5,
        readiness_timeout_secs: 2,
    }
}

fn harness(config: HarvesterConfig, script: Script) -> Harness {
    let tally = Arc::new(Tally::default());
    let launcher = Arc::new(ScriptedLauncher {
        tally: tally.clone(),
        script,
    });
    let state = Arc::new(RunState::new(&config, launcher));
    let detector: Arc<dyn BlockDetector> = Arc::new(MarkerBlockDetector::default());
    let client = build_http_client(&UserAgentConfig::default()).unwrap();
    let fetcher: Arc<dyn PageFetcher> = Arc::new(state.escalator(client, detector));
    Harness {
        state,
        fetcher,
        tally,
    }
}

async fn mount_page(server: &MockServer, route: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_string(body.to_string()))
        .mount(server)
        .await;
}

/// Parser that only understands pages containing an `<h1>`
fn h1_parser() -> Arc<dyn ProfileParser> {
    Arc::new(
        |html: &str, url: &str| -> Result<PartialRecord, ParseError> {
            let start = html.find("<h1>").ok_or_else(|| ParseError::Layout {
                url: url.to_string(),
                message: "no heading".to_string(),
            })?;
            let rest = &html[start + 4..];
            let end = rest.find("</h1>").unwrap_or(rest.len());
            Ok(PartialRecord {
                name: Some(rest[..end].to_string()),
                ..Default::default()
            })
        },
    )
}

#[tokio::test]
async fn test_parse_failure_keeps_raw_capture() {
    let server = MockServer::start().await;
    mount_page(&server, "/x", "<h1>Xena</h1>").await;
    mount_page(&server, "/y", "<p>layout changed</p>").await;

    let h = harness(harvester_config(4, 2), Script::default());
    let urls = vec![
        format!("{}/x", server.uri()),
        format!("{}/y", server.uri()),
    ];

    let output = HarvestOrchestrator::new(h.state.clone())
        .run(urls, h.fetcher.clone(), h1_parser(), "psychology", "run-1")
        .await
        .unwrap();

    assert_eq!(output.total_urls, 2);
    assert_eq!(output.raw_captures.len(), 2);
    assert_eq!(output.records.len(), 1);
    assert_eq!(output.records[0].name.as_deref(), Some("Xena"));
    assert_eq!(output.records[0].source_id.as_deref(), Some("psychology"));
    assert_eq!(output.failures.len(), 1);
    assert!(output.failures[0].0.ends_with("/y"));

    assert_eq!(output.metrics.pages_fetched, 2);
    assert_eq!(output.metrics.light_fetches, 2);
    assert_eq!(output.metrics.parse_failures, 1);

    // Nothing escalated, so the browser was never started
    assert_eq!(h.tally.launches.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_light_timeout_escalates_to_heavy() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/z"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("<h1>Too late</h1>")
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let h = harness(harvester_config(4, 2), Script::default());
    let parser: Arc<dyn ProfileParser> =
        Arc::new(SourceParser::new(Arc::new(DataScienceSource::default())));

    let output = HarvestOrchestrator::new(h.state.clone())
        .run(
            vec![format!("{}/z", server.uri())],
            h.fetcher.clone(),
            parser,
            "data-science",
            "run-1",
        )
        .await
        .unwrap();

    assert_eq!(output.records.len(), 1);
    assert_eq!(output.records[0].name.as_deref(), Some("Bob"));
    assert_eq!(output.raw_captures.len(), 1);
    assert_eq!(output.raw_captures[0].fetch_method, FetchMethod::Heavy);
    assert_eq!(output.metrics.heavy_fetches, 1);
    assert_eq!(output.metrics.light_fetches, 0);

    assert_eq!(h.tally.launches.load(Ordering::SeqCst), 1);
    assert_eq!(h.tally.closes.load(Ordering::SeqCst), 1);
    assert!(!h.state.renderer().is_running().await);
}

#[tokio::test]
async fn test_heavy_failures_are_contained() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let h = harness(
        harvester_config(4, 2),
        Script {
            fail_render: true,
            ..Default::default()
        },
    );
    let urls: Vec<String> = (0..5).map(|i| format!("{}/p{}", server.uri(), i)).collect();

    let output = HarvestOrchestrator::new(h.state.clone())
        .run(urls, h.fetcher.clone(), h1_parser(), "economics", "run-1")
        .await
        .unwrap();

    assert!(output.records.is_empty());
    assert!(output.raw_captures.is_empty());
    assert_eq!(output.failures.len(), 5);
    assert_eq!(output.metrics.parse_failures, 5);
    assert_eq!(output.metrics.pages_fetched, 0);

    // One render attempt per URL, one browser, shut down once
    assert_eq!(h.tally.renders.load(Ordering::SeqCst), 5);
    assert_eq!(h.tally.launches.load(Ordering::SeqCst), 1);
    assert_eq!(h.tally.closes.load(Ordering::SeqCst), 1);
    assert_eq!(h.tally.active_contexts.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_browser_contexts_respect_heavy_capacity() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(CHALLENGE_PAGE))
        .mount(&server)
        .await;

    let h = harness(
        harvester_config(8, 2),
        Script {
            render_delay: Duration::from_millis(50),
            ..Default::default()
        },
    );
    let urls: Vec<String> = (0..8).map(|i| format!("{}/p{}", server.uri(), i)).collect();

    let output = HarvestOrchestrator::new(h.state.clone())
        .run(urls, h.fetcher.clone(), h1_parser(), "economics", "run-1")
        .await
        .unwrap();

    assert_eq!(output.records.len(), 8);
    assert!(output
        .raw_captures
        .iter()
        .all(|c| c.fetch_method == FetchMethod::Heavy));
    assert_eq!(output.metrics.heavy_fetches, 8);

    let peak = h.tally.peak_contexts.load(Ordering::SeqCst);
    assert!(peak >= 1 && peak <= 2, "peak contexts {}", peak);
    assert_eq!(h.tally.launches.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_launch_failure_keeps_light_results() {
    let server = MockServer::start().await;
    mount_page(&server, "/ok", "<h1>Light</h1>").await;
    mount_page(&server, "/blocked-1", CHALLENGE_PAGE).await;
    mount_page(&server, "/blocked-2", CHALLENGE_PAGE).await;

    let h = harness(
        harvester_config(4, 2),
        Script {
            fail_launch: true,
            ..Default::default()
        },
    );
    let urls = vec![
        format!("{}/ok", server.uri()),
        format!("{}/blocked-1", server.uri()),
        format!("{}/blocked-2", server.uri()),
    ];

    let result = HarvestOrchestrator::new(h.state.clone())
        .run(urls, h.fetcher.clone(), h1_parser(), "psychology", "run-1")
        .await;

    match result {
        Err(HarvestError::RendererUnavailable {
            source_id, partial, ..
        }) => {
            assert_eq!(source_id, "psychology");
            assert_eq!(partial.records.len(), 1);
            assert_eq!(partial.records[0].name.as_deref(), Some("Light"));
            assert_eq!(partial.failures.len(), 2);
        }
        other => panic!("expected RendererUnavailable, got {:?}", other.map(|o| o.total_urls)),
    }

    // The failed launch is not retried by the second blocked URL
    assert_eq!(h.tally.launches.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_dropped_run_closes_browser_once() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(CHALLENGE_PAGE))
        .mount(&server)
        .await;

    let h = harness(
        harvester_config(4, 2),
        Script {
            render_delay: Duration::from_secs(2),
            ..Default::default()
        },
    );
    let urls: Vec<String> = (0..4).map(|i| format!("{}/p{}", server.uri(), i)).collect();
    let orchestrator = HarvestOrchestrator::new(h.state.clone());

    let result = tokio::time::timeout(
        Duration::from_millis(500),
        orchestrator.run(urls, h.fetcher.clone(), h1_parser(), "economics", "run-1"),
    )
    .await;
    assert!(result.is_err(), "run should still be rendering");

    // Shutdown of an abandoned run happens on a background task
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert_eq!(h.tally.launches.load(Ordering::SeqCst), 1);
    assert_eq!(h.tally.closes.load(Ordering::SeqCst), 1);
    assert!(!h.state.renderer().is_running().await);
}

#[tokio::test]
async fn test_duplicate_urls_are_fetched_once() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/x"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<h1>Once</h1>"))
        .expect(1)
        .mount(&server)
        .await;

    let h = harness(harvester_config(4, 2), Script::default());
    let url = format!("{}/x", server.uri());

    let output = HarvestOrchestrator::new(h.state.clone())
        .run(
            vec![url.clone(), url.clone(), url],
            h.fetcher.clone(),
            h1_parser(),
            "psychology",
            "run-1",
        )
        .await
        .unwrap();

    assert_eq!(output.total_urls, 1);
    assert_eq!(output.records.len(), 1);
}

#[tokio::test]
async fn test_harvest_source_end_to_end_with_storage() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/faculty",
        r#"<ul>
            <li><a href="/people/ada">Ada</a></li>
            <li><a href="/people/bea">Bea</a></li>
            <li><a href="/people/ada">Ada again</a></li>
        </ul>"#,
    )
    .await;
    mount_page(
        &server,
        "/people/ada",
        r#"<article class="container"><h1>Ada Lovelace</h1></article>
           <a href="mailto:ada@virginia.edu">ada@virginia.edu</a>"#,
    )
    .await;
    mount_page(&server, "/people/bea", CHALLENGE_PAGE).await;

    let tally = Arc::new(Tally::default());
    let launcher = Arc::new(ScriptedLauncher {
        tally: tally.clone(),
        script: Script {
            html: r#"<article class="container"><h1>Bea Rendered</h1></article>"#.to_string(),
            ..Default::default()
        },
    });
    let state = Arc::new(RunState::new(&harvester_config(4, 2), launcher));
    let source = build_source("psychology", Some(server.uri().as_str())).unwrap();

    let output = harvest_source(
        source,
        state.clone(),
        build_http_client(&UserAgentConfig::default()).unwrap(),
        Arc::new(MarkerBlockDetector::default()),
        None,
        "run-e2e",
    )
    .await
    .unwrap();

    assert_eq!(output.total_urls, 2);
    assert_eq!(output.records.len(), 2);
    // Directory pages are not counted in the run's metrics
    assert_eq!(output.metrics.pages_fetched, 2);
    assert_eq!(output.metrics.heavy_fetches, 1);
    assert_eq!(tally.closes.load(Ordering::SeqCst), 1);

    let dir = tempfile::tempdir().unwrap();
    let mut storage = SqliteStorage::new(&dir.path().join("harvest.sqlite")).unwrap();
    storage.create_run("run-e2e", "hash").unwrap();
    storage.insert_raw_pages(&output.raw_captures).unwrap();
    storage.upsert_records(&output.records, Utc::now()).unwrap();

    let metrics = SourceMetrics::from_output("psychology", &output);
    assert_eq!(metrics.emails_found, 1);
    assert_eq!(metrics.email_pct, 0.5);
    assert_eq!(metrics.heavy_pct, 0.5);
    storage.insert_source_metrics("run-e2e", &metrics).unwrap();
    storage
        .finish_run(
            "run-e2e",
            RunStatus::Completed,
            &RunTotals::from_sources(&[metrics]),
        )
        .unwrap();

    assert_eq!(storage.count_raw_pages().unwrap(), 2);
    assert_eq!(storage.count_raw_pages_by_method(FetchMethod::Heavy).unwrap(), 1);

    let bea = storage
        .get_record(&format!("{}/people/bea", server.uri()))
        .unwrap()
        .unwrap();
    assert_eq!(bea.name.as_deref(), Some("Bea Rendered"));
    assert_eq!(bea.source_id.as_deref(), Some("psychology"));

    let run = storage.get_run("run-e2e").unwrap();
    assert_eq!(run.records_parsed, 2);
    assert_eq!(run.status, RunStatus::Completed);
}

#[tokio::test]
async fn test_discovery_failure_shuts_renderer_down() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let tally = Arc::new(Tally::default());
    let launcher = Arc::new(ScriptedLauncher {
        tally: tally.clone(),
        script: Script {
            fail_render: true,
            ..Default::default()
        },
    });
    let state = Arc::new(RunState::new(&harvester_config(4, 2), launcher));
    let source = build_source("economics", Some(server.uri().as_str())).unwrap();

    let result = harvest_source(
        source,
        state.clone(),
        build_http_client(&UserAgentConfig::default()).unwrap(),
        Arc::new(MarkerBlockDetector::default()),
        None,
        "run-1",
    )
    .await;

    assert!(matches!(result, Err(HarvestError::Discovery { .. })));
    assert_eq!(tally.closes.load(Ordering::SeqCst), 1);
    assert!(!state.renderer().is_running().await);
}

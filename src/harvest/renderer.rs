//! Browser-tier renderer
//!
//! One browser engine is shared by every heavy fetch of a run. The engine is
//! launched on first use, each fetch gets its own isolated context, and the
//! engine is closed once when the run ends.
//!
//! The engine itself sits behind the [`BrowserLauncher`], [`BrowserEngine`]
//! and [`BrowserContext`] traits; the Chromium implementation lives in
//! [`crate::harvest::chromium`].

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;

/// Errors raised by the browser tier
#[derive(Debug, Clone, Error)]
pub enum RenderError {
    #[error("Failed to launch browser: {0}")]
    Launch(String),

    #[error("Renderer unavailable: {0}")]
    Unavailable(String),

    #[error("Renderer already shut down")]
    ShutDown,

    #[error("Failed to open browser context: {0}")]
    Context(String),

    #[error("Navigation to {url} timed out after {timeout:?}")]
    NavigationTimeout { url: String, timeout: Duration },

    #[error("Navigation to {url} failed: {message}")]
    Navigation { url: String, message: String },

    #[error("Readiness selector '{selector}' not found on {url} within {timeout:?}")]
    ReadinessTimeout {
        url: String,
        selector: String,
        timeout: Duration,
    },

    #[error("Failed to extract content from {url}: {message}")]
    Extract { url: String, message: String },

    #[error("Browser error: {0}")]
    Engine(String),
}

/// Starts a browser engine
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn launch(&self) -> Result<Arc<dyn BrowserEngine>, RenderError>;
}

/// A running browser shared across heavy fetches
#[async_trait]
pub trait BrowserEngine: Send + Sync {
    /// Opens a fresh context whose cookies and storage are not shared
    async fn new_context(&self) -> Result<Box<dyn BrowserContext>, RenderError>;

    /// Closes the browser and releases its process
    async fn close(&self) -> Result<(), RenderError>;
}

/// One isolated browsing context
#[async_trait]
pub trait BrowserContext: Send + Sync {
    /// Navigates and returns once the document's initial content is parsed
    async fn navigate(&mut self, url: &str) -> Result<(), RenderError>;

    /// Resolves once `selector` matches an element; never gives up on its own
    async fn wait_for_selector(&self, selector: &str) -> Result<(), RenderError>;

    /// Serialized HTML of the current document
    async fn content(&self) -> Result<String, RenderError>;

    async fn close(self: Box<Self>) -> Result<(), RenderError>;
}

/// Timeouts applied to every render
#[derive(Debug, Clone, Copy)]
pub struct RenderTimeouts {
    pub navigation: Duration,
    pub readiness: Duration,
}

impl Default for RenderTimeouts {
    fn default() -> Self {
        Self {
            navigation: Duration::from_secs(60),
            readiness: Duration::from_secs(15),
        }
    }
}

enum EngineSlot {
    Idle,
    Running(Arc<dyn BrowserEngine>),
    Failed(String),
    Closed,
}

/// Lazily started, once-closed browser shared by a run
pub struct HeavyRenderer {
    launcher: Arc<dyn BrowserLauncher>,
    slot: Mutex<EngineSlot>,
    timeouts: RenderTimeouts,
}

impl HeavyRenderer {
    pub fn new(launcher: Arc<dyn BrowserLauncher>, timeouts: RenderTimeouts) -> Self {
        Self {
            launcher,
            slot: Mutex::new(EngineSlot::Idle),
            timeouts,
        }
    }

    /// Returns the shared engine, launching it on first call
    ///
    /// A failed launch is remembered: later calls report the renderer as
    /// unavailable instead of launching again.
    pub async fn ensure_started(&self) -> Result<Arc<dyn BrowserEngine>, RenderError> {
        let mut slot = self.slot.lock().await;
        match &*slot {
            EngineSlot::Running(engine) => return Ok(engine.clone()),
            EngineSlot::Failed(reason) => return Err(RenderError::Unavailable(reason.clone())),
            EngineSlot::Closed => return Err(RenderError::ShutDown),
            EngineSlot::Idle => {}
        }

        tracing::info!("Launching shared browser");
        let launched = tokio::time::timeout(self.timeouts.navigation, self.launcher.launch())
            .await
            .unwrap_or_else(|_| {
                Err(RenderError::Launch(format!(
                    "browser did not start within {:?}",
                    self.timeouts.navigation
                )))
            });
        match launched {
            Ok(engine) => {
                *slot = EngineSlot::Running(engine.clone());
                Ok(engine)
            }
            Err(e) => {
                tracing::error!("Browser launch failed: {}", e);
                *slot = EngineSlot::Failed(e.to_string());
                Err(e)
            }
        }
    }

    /// Renders `url` in a fresh context and returns the serialized document
    ///
    /// When `readiness_selector` is given, extraction waits for it to appear
    /// and fails the render if it does not show up in time. Opening the
    /// context, loading, extraction and closing share one budget of the
    /// navigation timeout plus the readiness timeout. The context is closed on
    /// every path; the shared engine stays up.
    pub async fn render(
        &self,
        url: &str,
        readiness_selector: Option<&str>,
    ) -> Result<String, RenderError> {
        let engine = self.ensure_started().await?;
        let budget = self.render_budget(readiness_selector);

        let work = async {
            let context = engine.new_context().await?;
            let mut guard = ContextGuard::new(context, url);
            let result = self.render_in(&mut guard, url, readiness_selector).await;
            guard.close().await;
            result
        };

        match tokio::time::timeout(budget, work).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!("Render of {} exceeded {:?}", url, budget);
                Err(RenderError::NavigationTimeout {
                    url: url.to_string(),
                    timeout: budget,
                })
            }
        }
    }

    fn render_budget(&self, readiness_selector: Option<&str>) -> Duration {
        match readiness_selector {
            Some(_) => self.timeouts.navigation + self.timeouts.readiness,
            None => self.timeouts.navigation,
        }
    }

    async fn render_in(
        &self,
        guard: &mut ContextGuard,
        url: &str,
        readiness_selector: Option<&str>,
    ) -> Result<String, RenderError> {
        let context = guard.context_mut()?;

        tokio::time::timeout(self.timeouts.navigation, context.navigate(url))
            .await
            .map_err(|_| RenderError::NavigationTimeout {
                url: url.to_string(),
                timeout: self.timeouts.navigation,
            })??;

        if let Some(selector) = readiness_selector {
            tokio::time::timeout(self.timeouts.readiness, context.wait_for_selector(selector))
                .await
                .map_err(|_| RenderError::ReadinessTimeout {
                    url: url.to_string(),
                    selector: selector.to_string(),
                    timeout: self.timeouts.readiness,
                })??;
        }

        context.content().await
    }

    /// Closes the shared engine
    ///
    /// Safe to call repeatedly and before the engine was ever started. A
    /// failed launch is kept as is so [`HeavyRenderer::startup_failure`]
    /// still reports it.
    pub async fn shutdown(&self) {
        let mut slot = self.slot.lock().await;
        match std::mem::replace(&mut *slot, EngineSlot::Closed) {
            EngineSlot::Running(engine) => {
                tracing::info!("Shutting down shared browser");
                if let Err(e) = engine.close().await {
                    tracing::warn!("Browser shutdown reported an error: {}", e);
                }
            }
            // a launch failure stays visible to startup_failure
            EngineSlot::Failed(reason) => *slot = EngineSlot::Failed(reason),
            EngineSlot::Idle | EngineSlot::Closed => {}
        }
    }

    /// Reason the engine failed to launch, if it did
    pub async fn startup_failure(&self) -> Option<String> {
        match &*self.slot.lock().await {
            EngineSlot::Failed(reason) => Some(reason.clone()),
            _ => None,
        }
    }

    pub async fn is_running(&self) -> bool {
        matches!(&*self.slot.lock().await, EngineSlot::Running(_))
    }
}

/// Owns a browsing context for the duration of one render
///
/// [`ContextGuard::close`] is the normal path. If the guard is dropped with
/// the context still open (task aborted or panicked), closing is handed to a
/// background task so the context is not leaked.
struct ContextGuard {
    context: Option<Box<dyn BrowserContext>>,
    url: String,
}

impl ContextGuard {
    fn new(context: Box<dyn BrowserContext>, url: &str) -> Self {
        Self {
            context: Some(context),
            url: url.to_string(),
        }
    }

    fn context_mut(&mut self) -> Result<&mut Box<dyn BrowserContext>, RenderError> {
        self.context
            .as_mut()
            .ok_or_else(|| RenderError::Context("context already closed".to_string()))
    }

    async fn close(mut self) {
        if let Some(context) = self.context.take() {
            if let Err(e) = context.close().await {
                tracing::warn!("Failed to close browser context for {}: {}", self.url, e);
            }
        }
    }
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        if let Some(context) = self.context.take() {
            let url = std::mem::take(&mut self.url);
            if let Ok(handle) = tokio::runtime::Handle::try_current() {
                handle.spawn(async move {
                    if let Err(e) = context.close().await {
                        tracing::warn!("Deferred context close failed for {}: {}", url, e);
                    }
                });
            }
        }
    }
}

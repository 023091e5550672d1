//! Chromium engine for the browser tier, driven over CDP by chromiumoxide

use crate::config::BrowserConfig;
use crate::harvest::renderer::{BrowserContext, BrowserEngine, BrowserLauncher, RenderError};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig as ChromeConfig};
use chromiumoxide::cdp::browser_protocol::browser::BrowserContextId;
use chromiumoxide::cdp::browser_protocol::target::{
    CreateBrowserContextParams, CreateTargetParams, DisposeBrowserContextParams,
};
use chromiumoxide::Page;
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

const SELECTOR_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Launches a local Chrome/Chromium process
pub struct ChromiumLauncher {
    config: BrowserConfig,
    request_timeout: Duration,
}

impl ChromiumLauncher {
    /// `request_timeout` bounds individual CDP round-trips
    pub fn new(config: BrowserConfig, request_timeout: Duration) -> Self {
        Self {
            config,
            request_timeout,
        }
    }
}

#[async_trait]
impl BrowserLauncher for ChromiumLauncher {
    async fn launch(&self) -> Result<Arc<dyn BrowserEngine>, RenderError> {
        let mut builder = ChromeConfig::builder().request_timeout(self.request_timeout);
        if !self.config.headless {
            builder = builder.with_head();
        }
        if self.config.no_sandbox {
            builder = builder.no_sandbox();
        }
        if let Some(path) = &self.config.executable {
            builder = builder.chrome_executable(path);
        }
        let chrome_config = builder.build().map_err(RenderError::Launch)?;

        let (browser, mut handler) = Browser::launch(chrome_config)
            .await
            .map_err(|e| RenderError::Launch(e.to_string()))?;

        // The CDP connection only makes progress while its handler is polled
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::debug!("Browser handler error: {}", e);
                }
            }
        });

        Ok(Arc::new(ChromiumEngine {
            browser: Arc::new(Mutex::new(browser)),
            handler_task: std::sync::Mutex::new(Some(handler_task)),
        }))
    }
}

struct ChromiumEngine {
    browser: Arc<Mutex<Browser>>,
    handler_task: std::sync::Mutex<Option<JoinHandle<()>>>,
}

#[async_trait]
impl BrowserEngine for ChromiumEngine {
    async fn new_context(&self) -> Result<Box<dyn BrowserContext>, RenderError> {
        let browser = self.browser.lock().await;

        let context_id = browser
            .execute(CreateBrowserContextParams::default())
            .await
            .map_err(|e| RenderError::Context(e.to_string()))?
            .result
            .browser_context_id;

        let target = CreateTargetParams::builder()
            .url("about:blank")
            .browser_context_id(context_id.clone())
            .build()
            .map_err(RenderError::Context)?;

        let page = browser
            .new_page(target)
            .await
            .map_err(|e| RenderError::Context(e.to_string()))?;

        Ok(Box::new(ChromiumContext {
            page,
            context_id,
            browser: self.browser.clone(),
        }))
    }

    async fn close(&self) -> Result<(), RenderError> {
        let mut browser = self.browser.lock().await;
        let closed = browser
            .close()
            .await
            .map(|_| ())
            .map_err(|e| RenderError::Engine(e.to_string()));
        if let Err(e) = browser.wait().await {
            tracing::debug!("Waiting for browser exit failed: {}", e);
        }

        let handler_task = self
            .handler_task
            .lock()
            .ok()
            .and_then(|mut task| task.take());
        if let Some(task) = handler_task {
            task.abort();
        }
        closed
    }
}

struct ChromiumContext {
    page: Page,
    context_id: BrowserContextId,
    browser: Arc<Mutex<Browser>>,
}

#[async_trait]
impl BrowserContext for ChromiumContext {
    async fn navigate(&mut self, url: &str) -> Result<(), RenderError> {
        self.page
            .goto(url)
            .await
            .map_err(|e| RenderError::Navigation {
                url: url.to_string(),
                message: e.to_string(),
            })?;
        Ok(())
    }

    async fn wait_for_selector(&self, selector: &str) -> Result<(), RenderError> {
        loop {
            if self.page.find_element(selector).await.is_ok() {
                return Ok(());
            }
            tokio::time::sleep(SELECTOR_POLL_INTERVAL).await;
        }
    }

    async fn content(&self) -> Result<String, RenderError> {
        match self.page.content().await {
            Ok(html) => Ok(html),
            Err(e) => Err(RenderError::Extract {
                url: self.page.url().await.ok().flatten().unwrap_or_default(),
                message: e.to_string(),
            }),
        }
    }

    async fn close(self: Box<Self>) -> Result<(), RenderError> {
        let ChromiumContext {
            page,
            context_id,
            browser,
        } = *self;

        let page_closed = page
            .close()
            .await
            .map_err(|e| RenderError::Engine(e.to_string()));

        let browser = browser.lock().await;
        browser
            .execute(DisposeBrowserContextParams::new(context_id))
            .await
            .map_err(|e| RenderError::Engine(e.to_string()))?;

        page_closed
    }
}

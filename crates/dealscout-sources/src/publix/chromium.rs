//! chromiumoxide-backed browser for the weekly-ad scraper.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::{EnableParams, SetBlockedUrLsParams};
use chromiumoxide::Page;
use futures::StreamExt;
use tokio::task::JoinHandle;

use super::browser::{AdPage, BrowserLauncher, BrowserSession};
use crate::error::SourceError;

const SELECTOR_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Launches a local Chrome/Chromium.
#[derive(Debug, Clone)]
pub struct ChromiumLauncher {
    pub headless: bool,
    pub chrome_path: Option<PathBuf>,
    pub user_agent: Option<String>,
}

impl ChromiumLauncher {
    #[must_use]
    pub fn from_app_config(config: &dealscout_core::AppConfig) -> Self {
        Self {
            headless: config.publix_headless,
            chrome_path: config.publix_chrome_path.clone(),
            user_agent: None,
        }
    }
}

#[async_trait]
impl BrowserLauncher for ChromiumLauncher {
    async fn launch(&self) -> Result<Box<dyn BrowserSession>, SourceError> {
        let mut builder = BrowserConfig::builder().no_sandbox();
        if !self.headless {
            builder = builder.with_head();
        }
        if let Some(path) = &self.chrome_path {
            builder = builder.chrome_executable(path);
        }
        if let Some(ua) = &self.user_agent {
            builder = builder.arg(format!("--user-agent={ua}"));
        }
        let config = builder.build().map_err(SourceError::BrowserInit)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| SourceError::BrowserInit(e.to_string()))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(err) = event {
                    tracing::debug!(error = %err, "browser handler stopped");
                    break;
                }
            }
        });

        tracing::info!(headless = self.headless, "browser launched");
        Ok(Box::new(ChromiumSession {
            browser,
            handler_task,
        }))
    }
}

struct ChromiumSession {
    browser: Browser,
    handler_task: JoinHandle<()>,
}

#[async_trait]
impl BrowserSession for ChromiumSession {
    async fn new_page(&mut self) -> Result<Box<dyn AdPage>, SourceError> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| SourceError::Browser(e.to_string()))?;
        Ok(Box::new(ChromiumPage { page }))
    }

    async fn close(mut self: Box<Self>) -> Result<(), SourceError> {
        let closed = self
            .browser
            .close()
            .await
            .map_err(|e| SourceError::Browser(e.to_string()));
        if let Err(err) = self.browser.wait().await {
            tracing::debug!(error = %err, "browser process did not exit cleanly");
        }
        self.handler_task.abort();
        tracing::info!("browser closed");
        closed.map(|_| ())
    }
}

struct ChromiumPage {
    page: Page,
}

#[async_trait]
impl AdPage for ChromiumPage {
    async fn block_resources(&mut self, patterns: &[&str]) -> Result<(), SourceError> {
        self.page
            .execute(EnableParams::default())
            .await
            .map_err(|e| SourceError::Browser(e.to_string()))?;
        let urls = patterns.iter().map(|p| (*p).to_owned()).collect::<Vec<_>>();
        self.page
            .execute(SetBlockedUrLsParams::new(urls))
            .await
            .map_err(|e| SourceError::Browser(e.to_string()))?;
        Ok(())
    }

    async fn goto(&mut self, url: &str, timeout: Duration) -> Result<(), SourceError> {
        match tokio::time::timeout(timeout, self.page.goto(url)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(SourceError::Browser(format!("navigation to {url} failed: {e}"))),
            Err(_) => Err(SourceError::Timeout {
                what: format!("navigation to {url}"),
                after_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            }),
        }
    }

    async fn wait_for_any(
        &mut self,
        selectors: &[&str],
        timeout: Duration,
    ) -> Result<(), SourceError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            for selector in selectors {
                if self.page.find_element(*selector).await.is_ok() {
                    tracing::debug!(selector, "content selector matched");
                    return Ok(());
                }
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(SourceError::Timeout {
                    what: format!("any of {}", selectors.join(", ")),
                    after_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                });
            }
            tokio::time::sleep(SELECTOR_POLL_INTERVAL).await;
        }
    }

    async fn evaluate(&mut self, script: &str) -> Result<serde_json::Value, SourceError> {
        let result = self
            .page
            .evaluate(script.to_owned())
            .await
            .map_err(|e| SourceError::Extraction(e.to_string()))?;
        result
            .into_value::<serde_json::Value>()
            .map_err(|e| SourceError::Extraction(e.to_string()))
    }

    async fn close(self: Box<Self>) -> Result<(), SourceError> {
        self.page
            .close()
            .await
            .map_err(|e| SourceError::Browser(e.to_string()))
    }
}

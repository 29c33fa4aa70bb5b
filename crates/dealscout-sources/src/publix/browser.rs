//! Browser automation seam. Production uses [`super::ChromiumLauncher`];
//! tests drive the scraper with in-memory fakes.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::SourceError;

#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    /// Starts a browser process. Failures surface as [`SourceError::BrowserInit`].
    async fn launch(&self) -> Result<Box<dyn BrowserSession>, SourceError>;
}

#[async_trait]
pub trait BrowserSession: Send {
    async fn new_page(&mut self) -> Result<Box<dyn AdPage>, SourceError>;

    async fn close(self: Box<Self>) -> Result<(), SourceError>;
}

#[async_trait]
pub trait AdPage: Send {
    /// Blocks subresources whose URL matches any of the glob `patterns`.
    async fn block_resources(&mut self, patterns: &[&str]) -> Result<(), SourceError>;

    async fn goto(&mut self, url: &str, timeout: Duration) -> Result<(), SourceError>;

    /// Resolves once any selector matches an element.
    async fn wait_for_any(&mut self, selectors: &[&str], timeout: Duration)
        -> Result<(), SourceError>;

    /// Evaluates `script` and returns its JSON result.
    async fn evaluate(&mut self, script: &str) -> Result<serde_json::Value, SourceError>;

    async fn close(self: Box<Self>) -> Result<(), SourceError>;
}

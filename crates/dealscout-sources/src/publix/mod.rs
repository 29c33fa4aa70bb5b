//! Browser-automated scraper for the Publix weekly ad.

mod browser;
mod chromium;
mod extract;
mod price;
mod scraper;
mod types;

use std::sync::Arc;

use async_trait::async_trait;
use dealscout_core::{AppConfig, Clock, StoreChain};
use tokio::sync::Mutex;

use crate::error::SourceError;
use crate::source::{DealSource, RawDeal};

pub use browser::{AdPage, BrowserLauncher, BrowserSession};
pub use chromium::ChromiumLauncher;
pub use price::parse_price_text;
pub use scraper::{PublixScraper, ScrapeConfig};
pub use types::{ScrapeResult, ScrapedDeal, ScrapedDealType};

pub const PUBLIX_WEEKLY_AD_URL: &str = "https://www.publix.com/savings/weekly-ad/view-all";

/// [`DealSource`] adapter that serializes access to one [`PublixScraper`].
pub struct PublixSource {
    scraper: Mutex<PublixScraper>,
}

impl PublixSource {
    #[must_use]
    pub fn new(scraper: PublixScraper) -> Self {
        Self {
            scraper: Mutex::new(scraper),
        }
    }

    /// A scraper driving a local Chromium configured from `config`.
    #[must_use]
    pub fn from_app_config(config: &AppConfig, clock: Arc<dyn Clock>) -> Self {
        let launcher = ChromiumLauncher {
            user_agent: Some(config.user_agent.clone()),
            ..ChromiumLauncher::from_app_config(config)
        };
        let scrape_config = ScrapeConfig {
            backoff_base_ms: config.source_backoff_base_ms,
            ..ScrapeConfig::default()
        };
        Self::new(PublixScraper::new(Box::new(launcher), scrape_config, clock))
    }

    /// Runs one scrape, waiting for any scrape already in progress.
    pub async fn scrape(&self) -> ScrapeResult {
        self.scraper.lock().await.scrape().await
    }

    /// Releases the browser.
    ///
    /// # Errors
    ///
    /// Returns the browser's close error.
    pub async fn shutdown(&self) -> Result<(), SourceError> {
        self.scraper.lock().await.shutdown().await
    }
}

#[async_trait]
impl DealSource for PublixSource {
    fn chain(&self) -> StoreChain {
        StoreChain::Publix
    }

    fn source_url(&self) -> &str {
        PUBLIX_WEEKLY_AD_URL
    }

    async fn fetch_raw_deals(&self) -> Result<Vec<RawDeal>, SourceError> {
        let result = self.scrape().await;
        if result.success {
            Ok(result.deals.into_iter().map(RawDeal::Scraped).collect())
        } else {
            Err(SourceError::ScrapeFailed(
                result
                    .error
                    .unwrap_or_else(|| "no error recorded".to_owned()),
            ))
        }
    }
}

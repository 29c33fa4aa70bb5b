//! Weekly-ad scraper with a reused browser and per-attempt pages.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dealscout_core::Clock;

use super::browser::{AdPage, BrowserLauncher, BrowserSession};
use super::extract::{
    parse_bogo_cards, parse_discount_cards, BLOCKED_RESOURCE_PATTERNS, BOGO_SCRIPT,
    CONTENT_SELECTORS, DISCOUNT_SCRIPT,
};
use super::types::{ScrapeResult, ScrapedDeal};
use super::PUBLIX_WEEKLY_AD_URL;
use crate::error::SourceError;
use crate::retry::backoff_delay_ms;

#[derive(Debug, Clone)]
pub struct ScrapeConfig {
    pub max_attempts: u32,
    pub backoff_base_ms: u64,
    pub navigation_timeout: Duration,
    pub selector_timeout: Duration,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_base_ms: 1_000,
            navigation_timeout: Duration::from_secs(30),
            selector_timeout: Duration::from_secs(15),
        }
    }
}

/// Scrapes the Publix weekly ad.
///
/// `scrape` takes `&mut self`, so one scraper never runs two scrapes at once.
/// The browser is launched on first use and kept until [`Self::shutdown`].
pub struct PublixScraper {
    launcher: Box<dyn BrowserLauncher>,
    browser: Option<Box<dyn BrowserSession>>,
    config: ScrapeConfig,
    clock: Arc<dyn Clock>,
}

impl PublixScraper {
    #[must_use]
    pub fn new(
        launcher: Box<dyn BrowserLauncher>,
        config: ScrapeConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            launcher,
            browser: None,
            config,
            clock,
        }
    }

    #[must_use]
    pub fn is_browser_open(&self) -> bool {
        self.browser.is_some()
    }

    /// Runs up to `max_attempts` attempts with doubling back-off. Never
    /// returns an error; exhaustion yields `success == false`.
    pub async fn scrape(&mut self) -> ScrapeResult {
        let max_attempts = self.config.max_attempts.max(1);
        let mut last_error = None;

        for attempt in 1..=max_attempts {
            match self.attempt().await {
                Ok(deals) => {
                    tracing::info!(attempt, deals = deals.len(), "publix scrape succeeded");
                    return ScrapeResult {
                        success: true,
                        deals,
                        error: None,
                        attempts: attempt,
                    };
                }
                Err(err) => {
                    tracing::warn!(attempt, max_attempts, error = %err, "publix scrape attempt failed");
                    last_error = Some(err.to_string());
                    if attempt < max_attempts {
                        let delay_ms = backoff_delay_ms(self.config.backoff_base_ms, attempt);
                        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                    }
                }
            }
        }

        tracing::error!(max_attempts, error = ?last_error, "publix scrape exhausted retries");
        ScrapeResult {
            success: false,
            deals: Vec::new(),
            error: last_error,
            attempts: max_attempts,
        }
    }

    /// Closes the browser if one is running.
    ///
    /// # Errors
    ///
    /// Returns the browser's close error; the handle is released either way.
    pub async fn shutdown(&mut self) -> Result<(), SourceError> {
        match self.browser.take() {
            Some(browser) => browser.close().await,
            None => Ok(()),
        }
    }

    async fn attempt(&mut self) -> Result<Vec<ScrapedDeal>, SourceError> {
        let now = self.clock.now();
        let mut page = self.open_page().await?;
        let outcome = Self::extract(&self.config, page.as_mut(), now).await;
        if let Err(err) = page.close().await {
            tracing::warn!(error = %err, "failed to close publix page");
        }
        outcome
    }

    async fn open_page(&mut self) -> Result<Box<dyn AdPage>, SourceError> {
        if self.browser.is_none() {
            self.browser = Some(self.launcher.launch().await?);
        }
        let Some(browser) = self.browser.as_mut() else {
            return Err(SourceError::BrowserInit("browser unavailable".to_owned()));
        };
        match browser.new_page().await {
            Ok(page) => Ok(page),
            Err(err) => {
                // a browser that cannot open pages is relaunched next attempt
                if let Some(dead) = self.browser.take() {
                    if let Err(close_err) = dead.close().await {
                        tracing::debug!(error = %close_err, "closing unusable browser failed");
                    }
                }
                Err(err)
            }
        }
    }

    async fn extract(
        config: &ScrapeConfig,
        page: &mut dyn AdPage,
        now: DateTime<Utc>,
    ) -> Result<Vec<ScrapedDeal>, SourceError> {
        page.block_resources(BLOCKED_RESOURCE_PATTERNS).await?;
        page.goto(PUBLIX_WEEKLY_AD_URL, config.navigation_timeout)
            .await?;
        page.wait_for_any(CONTENT_SELECTORS, config.selector_timeout)
            .await?;

        let bogo = match page.evaluate(BOGO_SCRIPT).await {
            Ok(value) => parse_bogo_cards(value, now),
            Err(err) => Err(err),
        };
        let discount = match page.evaluate(DISCOUNT_SCRIPT).await {
            Ok(value) => parse_discount_cards(value, now),
            Err(err) => Err(err),
        };

        match (bogo, discount) {
            (Ok(mut deals), Ok(more)) => {
                deals.extend(more);
                Ok(deals)
            }
            (Ok(deals), Err(err)) => {
                tracing::warn!(error = %err, "publix discount pass failed, keeping bogo deals");
                Ok(deals)
            }
            (Err(err), Ok(deals)) => {
                tracing::warn!(error = %err, "publix bogo pass failed, keeping discount deals");
                Ok(deals)
            }
            (Err(bogo_err), Err(discount_err)) => Err(SourceError::Extraction(format!(
                "bogo pass: {bogo_err}; discount pass: {discount_err}"
            ))),
        }
    }
}

#[cfg(test)]
#[path = "scraper_test.rs"]
mod tests;

//! Deal sources: the Kroger REST API client and the Publix weekly-ad scraper.
//!
//! Both sit behind [`DealSource`] so the aggregator can drive them uniformly.

pub mod error;
pub mod kroger;
pub mod publix;
mod retry;
mod source;

pub use error::SourceError;
pub use kroger::{KrogerClient, KrogerConfig, RateGovernor};
pub use publix::{
    parse_price_text, AdPage, BrowserLauncher, BrowserSession, ChromiumLauncher, PublixScraper,
    PublixSource, ScrapeConfig, ScrapeResult, ScrapedDeal, ScrapedDealType, PUBLIX_WEEKLY_AD_URL,
};
pub use source::{DealSource, RawDeal};

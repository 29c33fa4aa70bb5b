use async_trait::async_trait;
use dealscout_core::{NewDeal, StoreChain};

use crate::error::SourceError;
use crate::publix::ScrapedDeal;

/// One offer as a source produced it, before normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum RawDeal {
    /// Already in canonical shape (Kroger).
    Canonical(NewDeal),
    /// Scraped from a page and still in source shape (Publix).
    Scraped(ScrapedDeal),
}

#[async_trait]
pub trait DealSource: Send + Sync {
    fn chain(&self) -> StoreChain;

    /// Where the source reads from; recorded on deals that lack their own URL.
    fn source_url(&self) -> &str;

    /// Fetches every offer the source currently publishes.
    async fn fetch_raw_deals(&self) -> Result<Vec<RawDeal>, SourceError>;
}

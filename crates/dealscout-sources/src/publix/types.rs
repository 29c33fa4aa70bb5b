use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ScrapedDealType {
    Bogo,
    Discount,
}

/// An offer as read off the weekly-ad page, prices already parsed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScrapedDeal {
    pub title: String,
    pub description: String,
    pub original_price: f64,
    pub sale_price: f64,
    pub deal_type: ScrapedDealType,
    /// `None` when the card carries no readable validity window.
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_until: Option<DateTime<Utc>>,
    pub category: Option<String>,
    pub image_url: Option<String>,
    pub item_id: Option<String>,
    pub restrictions: Option<String>,
    pub source_url: String,
}

/// Outcome of one `scrape` call. A failed scrape carries the last error
/// and no deals.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScrapeResult {
    pub success: bool,
    pub deals: Vec<ScrapedDeal>,
    pub error: Option<String>,
    pub attempts: u32,
}

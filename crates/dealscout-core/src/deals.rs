//! Canonical deal types shared by every source, the aggregator, and the
//! comparison engine.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::stores::StoreLocation;
use crate::CoreError;

/// Category assigned when a source leaves it blank.
pub const DEFAULT_CATEGORY: &str = "General";

/// A retailer brand with many physical locations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreChain {
    Kroger,
    Publix,
}

impl StoreChain {
    /// Stable lowercase identifier used in storage and as the comparison `store_id`.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            StoreChain::Kroger => "kroger",
            StoreChain::Publix => "publix",
        }
    }

    #[must_use]
    pub fn display_name(self) -> &'static str {
        match self {
            StoreChain::Kroger => "Kroger",
            StoreChain::Publix => "Publix",
        }
    }
}

impl fmt::Display for StoreChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StoreChain {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "kroger" => Ok(StoreChain::Kroger),
            "publix" => Ok(StoreChain::Publix),
            other => Err(CoreError::UnknownChain(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DealType {
    /// Buy one get one; modeled as an effective 50% discount.
    Bogo,
    Discount,
    Coupon,
}

impl DealType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            DealType::Bogo => "BOGO",
            DealType::Discount => "DISCOUNT",
            DealType::Coupon => "COUPON",
        }
    }
}

impl fmt::Display for DealType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DealType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "BOGO" => Ok(DealType::Bogo),
            "DISCOUNT" => Ok(DealType::Discount),
            "COUPON" => Ok(DealType::Coupon),
            other => Err(CoreError::UnknownDealType(other.to_string())),
        }
    }
}

/// A canonical offer that has not been persisted yet.
///
/// Kroger produces this shape directly; Publix scrape output is converted into
/// it by the normalizer before validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewDeal {
    pub chain: StoreChain,
    pub title: String,
    pub description: String,
    pub original_price: f64,
    pub sale_price: f64,
    pub discount_percentage: f64,
    pub deal_type: DealType,
    pub valid_from: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
    pub category: String,
    /// UPCs or source item identifiers this offer applies to.
    pub item_ids: Vec<String>,
    pub restrictions: Option<String>,
    pub image_url: Option<String>,
    pub source_url: Option<String>,
    /// Content hash used to match a re-sighted offer to its stored row.
    /// Empty until the normalizer assigns it.
    pub deal_key: String,
}

/// A persisted deal, including the store locations it is associated with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deal {
    pub id: Uuid,
    pub chain: StoreChain,
    pub title: String,
    pub description: String,
    pub original_price: f64,
    pub sale_price: f64,
    pub discount_percentage: f64,
    pub deal_type: DealType,
    pub valid_from: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
    pub category: String,
    pub item_ids: Vec<String>,
    pub restrictions: Option<String>,
    pub image_url: Option<String>,
    pub source_url: Option<String>,
    pub deal_key: String,
    pub is_active: bool,
    pub store_locations: Vec<StoreLocation>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Deal {
    /// Builds a freshly-created deal row from its canonical input.
    #[must_use]
    pub fn from_new(id: Uuid, new: NewDeal, now: DateTime<Utc>) -> Self {
        Self {
            id,
            chain: new.chain,
            title: new.title,
            description: new.description,
            original_price: new.original_price,
            sale_price: new.sale_price,
            discount_percentage: new.discount_percentage,
            deal_type: new.deal_type,
            valid_from: new.valid_from,
            valid_until: new.valid_until,
            category: new.category,
            item_ids: new.item_ids,
            restrictions: new.restrictions,
            image_url: new.image_url,
            source_url: new.source_url,
            deal_key: new.deal_key,
            is_active: true,
            store_locations: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Applies every `Some` field of `update` in place.
    pub fn apply(&mut self, update: &DealUpdate, now: DateTime<Utc>) {
        if let Some(title) = &update.title {
            self.title.clone_from(title);
        }
        if let Some(description) = &update.description {
            self.description.clone_from(description);
        }
        if let Some(price) = update.original_price {
            self.original_price = price;
        }
        if let Some(price) = update.sale_price {
            self.sale_price = price;
        }
        if let Some(pct) = update.discount_percentage {
            self.discount_percentage = pct;
        }
        if let Some(from) = update.valid_from {
            self.valid_from = from;
        }
        if let Some(until) = update.valid_until {
            self.valid_until = until;
        }
        if let Some(restrictions) = &update.restrictions {
            self.restrictions.clone_from(restrictions);
        }
        if let Some(image_url) = &update.image_url {
            self.image_url.clone_from(image_url);
        }
        self.updated_at = now;
    }
}

/// Partial field set for an in-place update. `None` leaves a field untouched;
/// for nullable columns `Some(None)` clears the value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DealUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub original_price: Option<f64>,
    pub sale_price: Option<f64>,
    pub discount_percentage: Option<f64>,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_until: Option<DateTime<Utc>>,
    pub restrictions: Option<Option<String>>,
    pub image_url: Option<Option<String>>,
}

impl DealUpdate {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Rounds a dollar amount to whole cents.
#[must_use]
pub fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// `round2((original - sale) / original * 100)`, never negative.
///
/// Returns `0.0` when `original` is not positive.
#[must_use]
pub fn discount_percentage(original: f64, sale: f64) -> f64 {
    if original <= 0.0 {
        return 0.0;
    }
    round_cents((original - sale) / original * 100.0).max(0.0)
}

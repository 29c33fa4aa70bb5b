use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use dealscout_core::DealType;
use serde::Serialize;
use uuid::Uuid;

/// One chain's best offer for an item.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StorePrice {
    /// Chain slug, e.g. `kroger`.
    pub store_id: String,
    pub store_name: String,
    pub deal_id: Uuid,
    pub title: String,
    pub price: f64,
    pub original_price: Option<f64>,
    pub discount_percentage: Option<f64>,
    pub deal_type: Option<DealType>,
    /// Miles to the nearest active associated location. Comparisons only
    /// admit deals with a located store inside the radius, so this is always
    /// `Some` there; `None` is kept for prices built from unlocated stores.
    pub distance_miles: Option<f64>,
    pub valid_until: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceComparison {
    /// Normalized query text.
    pub item_id: String,
    pub item_name: String,
    /// Cheapest first, one entry per chain.
    pub prices: Vec<StorePrice>,
    pub best_value: Option<StorePrice>,
    pub last_updated: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoreTotal {
    pub store_id: String,
    pub store_name: String,
    pub total_cost: f64,
    pub total_savings: f64,
    pub items_found: usize,
    pub distance_miles: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShoppingListPlan {
    /// Store id of the recommended chain; `None` when nothing matched.
    pub recommended_store: Option<String>,
    pub comparisons: Vec<PriceComparison>,
    pub store_totals: BTreeMap<String, StoreTotal>,
}

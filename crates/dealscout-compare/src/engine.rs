use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::sync::Arc;

use dealscout_core::{
    haversine_miles, round_cents, Clock, Deal, GeoPoint, StoreChain, StoreLocation,
};
use dealscout_db::{DbError, DealRepository, NearbyDealsQuery};
use futures::future::join_all;

use crate::policy::{pick_best, ComparisonPolicy};
use crate::types::{PriceComparison, ShoppingListPlan, StorePrice, StoreTotal};

pub struct PriceComparisonEngine {
    repo: Arc<dyn DealRepository>,
    clock: Arc<dyn Clock>,
    policy: ComparisonPolicy,
}

impl PriceComparisonEngine {
    #[must_use]
    pub fn new(
        repo: Arc<dyn DealRepository>,
        clock: Arc<dyn Clock>,
        policy: ComparisonPolicy,
    ) -> Self {
        Self {
            repo,
            clock,
            policy,
        }
    }

    /// Compares every chain's cheapest active offer for `item_name` near
    /// `location`.
    ///
    /// Returns `Ok(None)` without a location or when nothing matches.
    /// `radius_miles` falls back to the policy default.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the deal lookup fails.
    pub async fn compare_item_prices(
        &self,
        item_name: &str,
        location: Option<GeoPoint>,
        radius_miles: Option<f64>,
    ) -> Result<Option<PriceComparison>, DbError> {
        let Some(point) = location else {
            tracing::debug!(item = item_name, "compare: no location supplied");
            return Ok(None);
        };
        let item_name = item_name.trim();
        let now = self.clock.now();

        let query = NearbyDealsQuery {
            point,
            radius_miles: radius_miles.unwrap_or(self.policy.default_radius_miles),
            now,
            search: Some(item_name.to_string()).filter(|s| !s.is_empty()),
            limit: self.policy.max_deals,
        };
        let deals = self.repo.find_active_deals_near(&query).await?;
        if deals.is_empty() {
            tracing::debug!(item = item_name, "compare: no matching deals");
            return Ok(None);
        }

        let mut cheapest: BTreeMap<StoreChain, StorePrice> = BTreeMap::new();
        for deal in &deals {
            let candidate = store_price(deal, point);
            match cheapest.entry(deal.chain) {
                Entry::Vacant(slot) => {
                    slot.insert(candidate);
                }
                Entry::Occupied(mut slot) => {
                    if candidate.price < slot.get().price {
                        slot.insert(candidate);
                    }
                }
            }
        }

        let mut prices: Vec<StorePrice> = cheapest.into_values().collect();
        prices.sort_by(|a, b| a.price.total_cmp(&b.price));
        let best_value = pick_best(
            &prices,
            self.policy.tie_band,
            |p| p.price,
            |p| p.distance_miles,
        )
        .cloned();

        tracing::debug!(
            item = item_name,
            matches = deals.len(),
            stores = prices.len(),
            "compare: item compared"
        );
        Ok(Some(PriceComparison {
            item_id: item_name.to_lowercase(),
            item_name: item_name.to_string(),
            prices,
            best_value,
            last_updated: now,
        }))
    }

    /// Compares each name concurrently, dropping names with no result.
    /// Output order is not guaranteed to follow `item_names`.
    ///
    /// # Errors
    ///
    /// Returns the first [`DbError`] any lookup hit.
    pub async fn compare_multiple_items(
        &self,
        item_names: &[String],
        location: Option<GeoPoint>,
        radius_miles: Option<f64>,
    ) -> Result<Vec<PriceComparison>, DbError> {
        let lookups = item_names
            .iter()
            .map(|name| self.compare_item_prices(name, location, radius_miles));

        let mut comparisons = Vec::with_capacity(item_names.len());
        for outcome in join_all(lookups).await {
            if let Some(comparison) = outcome? {
                comparisons.push(comparison);
            }
        }
        Ok(comparisons)
    }

    /// Totals each chain's price for the list and recommends one, preferring
    /// a strictly closer chain whose total is within the list tie band.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if any lookup fails.
    pub async fn get_best_store_for_list(
        &self,
        item_names: &[String],
        location: Option<GeoPoint>,
        radius_miles: Option<f64>,
    ) -> Result<ShoppingListPlan, DbError> {
        let comparisons = self
            .compare_multiple_items(item_names, location, radius_miles)
            .await?;

        let mut store_totals: BTreeMap<String, StoreTotal> = BTreeMap::new();
        for price in comparisons.iter().flat_map(|c| &c.prices) {
            let total = store_totals
                .entry(price.store_id.clone())
                .or_insert_with(|| StoreTotal {
                    store_id: price.store_id.clone(),
                    store_name: price.store_name.clone(),
                    total_cost: 0.0,
                    total_savings: 0.0,
                    items_found: 0,
                    distance_miles: None,
                });
            total.total_cost += price.price;
            if let Some(original) = price.original_price {
                total.total_savings += (original - price.price).max(0.0);
            }
            total.items_found += 1;
            total.distance_miles = min_distance(total.distance_miles, price.distance_miles);
        }
        for total in store_totals.values_mut() {
            total.total_cost = round_cents(total.total_cost);
            total.total_savings = round_cents(total.total_savings);
        }

        let mut ranked: Vec<&StoreTotal> = store_totals.values().collect();
        ranked.sort_by(|a, b| a.total_cost.total_cmp(&b.total_cost));
        let recommended_store = pick_best(
            ranked.iter().copied(),
            self.policy.list_tie_band,
            |t| t.total_cost,
            |t| t.distance_miles,
        )
        .map(|t| t.store_id.clone());

        tracing::info!(
            items = item_names.len(),
            compared = comparisons.len(),
            recommended = recommended_store.as_deref().unwrap_or("none"),
            "compare: shopping list planned"
        );
        Ok(ShoppingListPlan {
            recommended_store,
            comparisons,
            store_totals,
        })
    }
}

fn store_price(deal: &Deal, from: GeoPoint) -> StorePrice {
    let distance_miles = deal
        .store_locations
        .iter()
        .filter(|s| s.is_active)
        .filter_map(StoreLocation::geo_point)
        .map(|p| haversine_miles(from, p))
        .reduce(f64::min);

    StorePrice {
        store_id: deal.chain.as_str().to_string(),
        store_name: deal.chain.display_name().to_string(),
        deal_id: deal.id,
        title: deal.title.clone(),
        price: deal.sale_price,
        original_price: Some(deal.original_price),
        discount_percentage: Some(deal.discount_percentage),
        deal_type: Some(deal.deal_type),
        distance_miles,
        valid_until: Some(deal.valid_until),
    }
}

fn min_distance(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

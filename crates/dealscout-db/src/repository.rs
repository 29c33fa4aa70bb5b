//! The narrow persistence contract consumed by the aggregator and the
//! comparison engine.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dealscout_core::{Deal, DealUpdate, GeoPoint, NewDeal, StoreChain, StoreLocation};
use uuid::Uuid;

use crate::DbError;

/// Filter for location-scoped deal lookups.
#[derive(Debug, Clone)]
pub struct NearbyDealsQuery {
    pub point: GeoPoint,
    pub radius_miles: f64,
    /// Deals whose `valid_until` is at or before this instant are excluded.
    pub now: DateTime<Utc>,
    /// Case-insensitive substring matched against title or description.
    pub search: Option<String>,
    pub limit: usize,
}

#[async_trait]
pub trait DealRepository: Send + Sync {
    async fn create_deal(&self, deal: &NewDeal) -> Result<Deal, DbError>;

    /// Applies `update` to the deal; `Ok(None)` when no such deal exists.
    async fn update_deal(&self, id: Uuid, update: &DealUpdate) -> Result<Option<Deal>, DbError>;

    /// The active deal for `chain` carrying `deal_key`, if any.
    async fn find_deal_by_key(
        &self,
        chain: StoreChain,
        deal_key: &str,
    ) -> Result<Option<Deal>, DbError>;

    /// Active store locations for the chain.
    async fn find_stores_by_chain(&self, chain: StoreChain)
        -> Result<Vec<StoreLocation>, DbError>;

    /// Active deals whose `valid_until` is strictly before `now`.
    async fn find_expired_deals(&self, now: DateTime<Utc>) -> Result<Vec<Deal>, DbError>;

    /// Soft-expires the deal. Returns `false` if it was missing or already inactive.
    async fn delete_deal(&self, id: Uuid) -> Result<bool, DbError>;

    /// Replaces every prior association of the deal.
    async fn associate_deal_with_stores(
        &self,
        deal_id: Uuid,
        store_location_ids: &[Uuid],
    ) -> Result<(), DbError>;

    /// Active, unexpired deals with at least one associated store inside the
    /// radius, cheapest first, each carrying its store locations.
    async fn find_active_deals_near(&self, query: &NearbyDealsQuery)
        -> Result<Vec<Deal>, DbError>;
}

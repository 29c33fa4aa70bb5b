//! Postgres-backed [`DealRepository`].

mod deals;
mod stores;
mod types;

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dealscout_core::{Deal, DealUpdate, NewDeal, StoreChain, StoreLocation};
use sqlx::PgPool;
use uuid::Uuid;

pub use types::{escape_like, DealRow, StoreLocationRow};

use crate::repository::{DealRepository, NearbyDealsQuery};
use crate::DbError;

#[derive(Debug, Clone)]
pub struct PgDealRepository {
    pool: PgPool,
}

impl PgDealRepository {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Converts rows and attaches each deal's store locations in one batch query.
    async fn hydrate(&self, rows: Vec<DealRow>) -> Result<Vec<Deal>, DbError> {
        let mut deals = rows
            .into_iter()
            .map(Deal::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        let ids: Vec<Uuid> = deals.iter().map(|d| d.id).collect();

        let mut by_deal: HashMap<Uuid, Vec<StoreLocation>> = HashMap::new();
        for linked in stores::find_linked(&self.pool, &ids).await? {
            by_deal
                .entry(linked.deal_id)
                .or_default()
                .push(StoreLocation::try_from(linked.store)?);
        }
        for deal in &mut deals {
            deal.store_locations = by_deal.remove(&deal.id).unwrap_or_default();
        }
        Ok(deals)
    }

    async fn hydrate_one(&self, row: Option<DealRow>) -> Result<Option<Deal>, DbError> {
        match row {
            Some(row) => Ok(self.hydrate(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl DealRepository for PgDealRepository {
    async fn create_deal(&self, deal: &NewDeal) -> Result<Deal, DbError> {
        let row = deals::insert_deal(&self.pool, deal).await?;
        Deal::try_from(row)
    }

    async fn update_deal(&self, id: Uuid, update: &DealUpdate) -> Result<Option<Deal>, DbError> {
        let row = deals::update_deal(&self.pool, id, update).await?;
        self.hydrate_one(row).await
    }

    async fn find_deal_by_key(
        &self,
        chain: StoreChain,
        deal_key: &str,
    ) -> Result<Option<Deal>, DbError> {
        let row = deals::find_by_key(&self.pool, chain, deal_key).await?;
        self.hydrate_one(row).await
    }

    async fn find_stores_by_chain(
        &self,
        chain: StoreChain,
    ) -> Result<Vec<StoreLocation>, DbError> {
        stores::find_by_chain(&self.pool, chain)
            .await?
            .into_iter()
            .map(StoreLocation::try_from)
            .collect()
    }

    async fn find_expired_deals(&self, now: DateTime<Utc>) -> Result<Vec<Deal>, DbError> {
        let rows = deals::find_expired(&self.pool, now).await?;
        self.hydrate(rows).await
    }

    async fn delete_deal(&self, id: Uuid) -> Result<bool, DbError> {
        let deactivated = deals::deactivate(&self.pool, id).await?;
        if deactivated {
            tracing::debug!(deal_id = %id, "deal deactivated");
        }
        Ok(deactivated)
    }

    async fn associate_deal_with_stores(
        &self,
        deal_id: Uuid,
        store_location_ids: &[Uuid],
    ) -> Result<(), DbError> {
        stores::replace_links(&self.pool, deal_id, store_location_ids).await
    }

    async fn find_active_deals_near(
        &self,
        query: &NearbyDealsQuery,
    ) -> Result<Vec<Deal>, DbError> {
        let rows = deals::find_active_near(&self.pool, query).await?;
        self.hydrate(rows).await
    }
}

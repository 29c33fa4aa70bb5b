//! In-process [`DealRepository`] used by tests and dry runs.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dealscout_core::{
    haversine_miles, Clock, Deal, DealUpdate, NewDeal, StoreChain, StoreLocation, SystemClock,
};
use uuid::Uuid;

use crate::repository::{DealRepository, NearbyDealsQuery};
use crate::DbError;

#[derive(Default)]
struct State {
    deals: HashMap<Uuid, Deal>,
    stores: HashMap<Uuid, StoreLocation>,
    associations: HashMap<Uuid, Vec<Uuid>>,
    fail_create_titles: HashSet<String>,
    fail_delete_ids: HashSet<Uuid>,
    fail_store_lookup: bool,
    failing_associations: usize,
}

impl State {
    fn hydrate(&self, deal: &Deal) -> Deal {
        let mut out = deal.clone();
        out.store_locations = self
            .associations
            .get(&deal.id)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| self.stores.get(id).cloned())
                    .collect()
            })
            .unwrap_or_default();
        out
    }
}

/// Keeps deals, stores, and associations in a mutex-guarded map.
///
/// Failure injection hooks (`fail_create_for_title`, `fail_delete_for`,
/// `fail_next_associations`, `fail_store_lookups`) let callers exercise
/// partial-failure paths.
pub struct MemoryDealRepository {
    state: Mutex<State>,
    clock: Arc<dyn Clock>,
}

impl Default for MemoryDealRepository {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

impl MemoryDealRepository {
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Mutex::new(State::default()),
            clock,
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn add_store(&self, store: StoreLocation) {
        self.lock().stores.insert(store.id, store);
    }

    /// Inserts a fully-formed deal as-is, bypassing `create_deal`.
    pub fn insert_deal(&self, deal: Deal) {
        let mut state = self.lock();
        let ids = deal.store_locations.iter().map(|s| s.id).collect();
        for store in &deal.store_locations {
            state.stores.entry(store.id).or_insert_with(|| store.clone());
        }
        state.associations.insert(deal.id, ids);
        state.deals.insert(deal.id, deal);
    }

    #[must_use]
    pub fn deal(&self, id: Uuid) -> Option<Deal> {
        let state = self.lock();
        state.deals.get(&id).map(|d| state.hydrate(d))
    }

    /// Every stored deal, active or not, ordered by creation time.
    #[must_use]
    pub fn deals(&self) -> Vec<Deal> {
        let state = self.lock();
        let mut all: Vec<Deal> = state.deals.values().map(|d| state.hydrate(d)).collect();
        all.sort_by_key(|d| d.created_at);
        all
    }

    #[must_use]
    pub fn associated_store_ids(&self, deal_id: Uuid) -> Vec<Uuid> {
        self.lock()
            .associations
            .get(&deal_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn fail_create_for_title(&self, title: &str) {
        self.lock().fail_create_titles.insert(title.to_string());
    }

    pub fn fail_delete_for(&self, id: Uuid) {
        self.lock().fail_delete_ids.insert(id);
    }

    /// The next `count` association calls fail with [`DbError::Unavailable`].
    pub fn fail_next_associations(&self, count: usize) {
        self.lock().failing_associations = count;
    }

    pub fn fail_store_lookups(&self, fail: bool) {
        self.lock().fail_store_lookup = fail;
    }
}

#[async_trait]
impl DealRepository for MemoryDealRepository {
    async fn create_deal(&self, deal: &NewDeal) -> Result<Deal, DbError> {
        let mut state = self.lock();
        if state.fail_create_titles.contains(&deal.title) {
            return Err(DbError::Unavailable(format!(
                "insert rejected for '{}'",
                deal.title
            )));
        }
        let created = Deal::from_new(Uuid::new_v4(), deal.clone(), self.clock.now());
        state.deals.insert(created.id, created.clone());
        Ok(created)
    }

    async fn update_deal(&self, id: Uuid, update: &DealUpdate) -> Result<Option<Deal>, DbError> {
        let now = self.clock.now();
        let mut state = self.lock();
        let Some(deal) = state.deals.get_mut(&id) else {
            return Ok(None);
        };
        deal.apply(update, now);
        let updated = deal.clone();
        Ok(Some(state.hydrate(&updated)))
    }

    async fn find_deal_by_key(
        &self,
        chain: StoreChain,
        deal_key: &str,
    ) -> Result<Option<Deal>, DbError> {
        let state = self.lock();
        Ok(state
            .deals
            .values()
            .find(|d| d.is_active && d.chain == chain && d.deal_key == deal_key)
            .map(|d| state.hydrate(d)))
    }

    async fn find_stores_by_chain(
        &self,
        chain: StoreChain,
    ) -> Result<Vec<StoreLocation>, DbError> {
        let state = self.lock();
        if state.fail_store_lookup {
            return Err(DbError::Unavailable("store lookup failed".to_string()));
        }
        let mut stores: Vec<StoreLocation> = state
            .stores
            .values()
            .filter(|s| s.is_active && s.chain == chain)
            .cloned()
            .collect();
        stores.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(stores)
    }

    async fn find_expired_deals(&self, now: DateTime<Utc>) -> Result<Vec<Deal>, DbError> {
        let state = self.lock();
        let mut expired: Vec<Deal> = state
            .deals
            .values()
            .filter(|d| d.is_active && d.valid_until < now)
            .map(|d| state.hydrate(d))
            .collect();
        expired.sort_by_key(|d| d.valid_until);
        Ok(expired)
    }

    async fn delete_deal(&self, id: Uuid) -> Result<bool, DbError> {
        let now = self.clock.now();
        let mut state = self.lock();
        if state.fail_delete_ids.contains(&id) {
            return Err(DbError::Unavailable(format!("delete rejected for {id}")));
        }
        match state.deals.get_mut(&id) {
            Some(deal) if deal.is_active => {
                deal.is_active = false;
                deal.updated_at = now;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn associate_deal_with_stores(
        &self,
        deal_id: Uuid,
        store_location_ids: &[Uuid],
    ) -> Result<(), DbError> {
        let mut state = self.lock();
        if state.failing_associations > 0 {
            state.failing_associations -= 1;
            return Err(DbError::Unavailable(format!(
                "association rejected for {deal_id}"
            )));
        }
        if !state.deals.contains_key(&deal_id) {
            return Err(DbError::NotFound);
        }
        let mut ids: Vec<Uuid> = Vec::with_capacity(store_location_ids.len());
        for id in store_location_ids {
            if !ids.contains(id) {
                ids.push(*id);
            }
        }
        state.associations.insert(deal_id, ids);
        Ok(())
    }

    async fn find_active_deals_near(
        &self,
        query: &NearbyDealsQuery,
    ) -> Result<Vec<Deal>, DbError> {
        let state = self.lock();
        let needle = query.search.as_ref().map(|s| s.to_lowercase());

        let mut matches: Vec<Deal> = state
            .deals
            .values()
            .filter(|d| d.is_active && d.valid_until > query.now)
            .filter(|d| match &needle {
                Some(n) => {
                    d.title.to_lowercase().contains(n) || d.description.to_lowercase().contains(n)
                }
                None => true,
            })
            .map(|d| state.hydrate(d))
            .filter(|d| {
                d.store_locations.iter().any(|s| {
                    s.is_active
                        && s.geo_point()
                            .is_some_and(|p| haversine_miles(query.point, p) <= query.radius_miles)
                })
            })
            .collect();

        matches.sort_by(|a, b| a.sale_price.total_cmp(&b.sale_price));
        matches.truncate(query.limit);
        Ok(matches)
    }
}

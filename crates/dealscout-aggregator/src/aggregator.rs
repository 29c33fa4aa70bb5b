use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use chrono::{DateTime, Utc};
use dealscout_core::{AppConfig, Clock, StoreChain};
use dealscout_db::{DbError, DealRepository};
use dealscout_sources::{DealSource, RawDeal};
use thiserror::Error;
use uuid::Uuid;

use crate::error::AggregatorError;
use crate::normalize::{self, ValidationError};
use crate::scheduler::{DealScheduler, ScheduleConfig};
use crate::stats::AggregationStats;
use crate::types::{AggregationResult, CleanupResult};

/// A run succeeds while fewer than this share of its deals failed.
pub const DEFAULT_PARTIAL_SUCCESS_THRESHOLD: f64 = 0.5;

#[derive(Debug, Clone)]
pub struct AggregatorConfig {
    pub partial_success_threshold: f64,
    pub schedule: ScheduleConfig,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            partial_success_threshold: DEFAULT_PARTIAL_SUCCESS_THRESHOLD,
            schedule: ScheduleConfig::default(),
        }
    }
}

impl AggregatorConfig {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            partial_success_threshold: config.partial_success_threshold,
            schedule: ScheduleConfig::from_app_config(config),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Created,
    Updated,
    Unchanged,
}

#[derive(Debug, Error)]
enum DealFailure {
    #[error(transparent)]
    Invalid(#[from] ValidationError),

    #[error("{title}: {source}")]
    Storage {
        title: String,
        #[source]
        source: DbError,
    },
}

/// Holds the full-run flag for its lifetime.
struct RunGuard<'a>(&'a AtomicBool);

impl<'a> RunGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Pulls deals from both chains into storage and owns the refresh schedule.
pub struct DealAggregator {
    repo: Arc<dyn DealRepository>,
    kroger: Arc<dyn DealSource>,
    publix: Arc<dyn DealSource>,
    clock: Arc<dyn Clock>,
    config: AggregatorConfig,
    stats: Mutex<AggregationStats>,
    running: AtomicBool,
    scheduler: tokio::sync::Mutex<Option<DealScheduler>>,
}

impl DealAggregator {
    #[must_use]
    pub fn new(
        repo: Arc<dyn DealRepository>,
        kroger: Arc<dyn DealSource>,
        publix: Arc<dyn DealSource>,
        clock: Arc<dyn Clock>,
        config: AggregatorConfig,
    ) -> Self {
        Self {
            repo,
            kroger,
            publix,
            clock,
            config,
            stats: Mutex::new(AggregationStats::default()),
            running: AtomicBool::new(false),
            scheduler: tokio::sync::Mutex::new(None),
        }
    }

    /// Runs both chains concurrently and returns `[kroger, publix]`.
    ///
    /// # Errors
    ///
    /// Returns [`AggregatorError::AlreadyRunning`] if another full run holds
    /// the flag. Source failures never error; they come back as failed results.
    pub async fn aggregate_all_deals(&self) -> Result<Vec<AggregationResult>, AggregatorError> {
        let Some(_guard) = RunGuard::acquire(&self.running) else {
            tracing::warn!("aggregator: full run rejected; another is in progress");
            return Err(AggregatorError::AlreadyRunning);
        };

        tracing::info!("aggregator: starting full run");
        let (kroger, publix) = tokio::join!(
            self.aggregate_source(self.kroger.as_ref()),
            self.aggregate_source(self.publix.as_ref()),
        );
        tracing::info!(
            kroger_new = kroger.new_deals,
            publix_new = publix.new_deals,
            "aggregator: full run complete"
        );
        Ok(vec![kroger, publix])
    }

    pub async fn aggregate_kroger_deals(&self) -> AggregationResult {
        self.aggregate_source(self.kroger.as_ref()).await
    }

    pub async fn aggregate_publix_deals(&self) -> AggregationResult {
        self.aggregate_source(self.publix.as_ref()).await
    }

    /// Soft-expires every active deal past its window. Per-deal failures are
    /// collected and the batch continues.
    pub async fn cleanup_expired_deals(&self) -> CleanupResult {
        let now = self.clock.now();
        let expired = match self.repo.find_expired_deals(now).await {
            Ok(deals) => deals,
            Err(e) => {
                tracing::error!(error = %e, "aggregator: failed to load expired deals");
                return CleanupResult {
                    expired_found: 0,
                    deleted: 0,
                    errors: vec![format!("failed to load expired deals: {e}")],
                    timestamp: now,
                };
            }
        };

        let mut deleted = 0;
        let mut errors = Vec::new();
        for deal in &expired {
            match self.repo.delete_deal(deal.id).await {
                Ok(true) => deleted += 1,
                Ok(false) => {
                    tracing::debug!(deal_id = %deal.id, "aggregator: deal already inactive");
                }
                Err(e) => {
                    tracing::warn!(deal_id = %deal.id, error = %e, "aggregator: failed to expire deal");
                    errors.push(format!("{}: {e}", deal.id));
                }
            }
        }

        tracing::info!(
            expired = expired.len(),
            deleted,
            failed = errors.len(),
            "aggregator: cleanup complete"
        );
        CleanupResult {
            expired_found: expired.len(),
            deleted,
            errors,
            timestamp: now,
        }
    }

    /// Registers the refresh and cleanup triggers. A no-op while already started.
    ///
    /// # Errors
    ///
    /// Returns [`AggregatorError`] if a cron expression is invalid or the
    /// scheduler cannot start.
    pub async fn start_scheduled_jobs(self: &Arc<Self>) -> Result<(), AggregatorError> {
        let mut slot = self.scheduler.lock().await;
        if slot.is_some() {
            tracing::debug!("aggregator: scheduled jobs already running");
            return Ok(());
        }
        *slot = Some(DealScheduler::start(Arc::downgrade(self), &self.config.schedule).await?);
        Ok(())
    }

    /// Cancels every trigger. A no-op while stopped.
    ///
    /// # Errors
    ///
    /// Returns [`AggregatorError::Scheduler`] if the scheduler fails to shut down.
    pub async fn stop_scheduled_jobs(&self) -> Result<(), AggregatorError> {
        let Some(scheduler) = self.scheduler.lock().await.take() else {
            return Ok(());
        };
        scheduler.shutdown().await
    }

    pub async fn scheduled_job_count(&self) -> usize {
        self.scheduler
            .lock()
            .await
            .as_ref()
            .map_or(0, DealScheduler::job_count)
    }

    #[must_use]
    pub fn stats(&self) -> AggregationStats {
        self.stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    #[must_use]
    pub fn is_aggregation_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    async fn aggregate_source(&self, source: &dyn DealSource) -> AggregationResult {
        let chain = source.chain();
        let timestamp = self.clock.now();
        let started = Instant::now();
        tracing::info!(source = %chain, "aggregator: starting run");

        let result = self.run_pipeline(source, chain, timestamp, started).await;

        if result.success {
            tracing::info!(
                source = %chain,
                processed = result.total_processed,
                new = result.new_deals,
                updated = result.updated_deals,
                unchanged = result.unchanged_deals,
                failed = result.errors.len(),
                duration_ms = result.duration_ms,
                "aggregator: run complete"
            );
        } else {
            tracing::error!(
                source = %chain,
                processed = result.total_processed,
                errors = ?result.errors,
                "aggregator: run failed"
            );
        }

        self.stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .record(&result);
        result
    }

    async fn run_pipeline(
        &self,
        source: &dyn DealSource,
        chain: StoreChain,
        timestamp: DateTime<Utc>,
        started: Instant,
    ) -> AggregationResult {
        let raw_deals = match source.fetch_raw_deals().await {
            Ok(deals) => deals,
            Err(e) => {
                return AggregationResult::failed(
                    chain,
                    format!("failed to fetch {chain} deals: {e}"),
                    elapsed_ms(started),
                    timestamp,
                );
            }
        };

        let store_ids: Vec<Uuid> = match self.repo.find_stores_by_chain(chain).await {
            Ok(stores) => stores.into_iter().map(|s| s.id).collect(),
            Err(e) => {
                return AggregationResult::failed(
                    chain,
                    format!("failed to load {chain} store locations: {e}"),
                    elapsed_ms(started),
                    timestamp,
                );
            }
        };
        if store_ids.is_empty() {
            tracing::warn!(source = %chain, "aggregator: no active store locations for chain");
        }

        let total = raw_deals.len();
        let (mut new_deals, mut updated_deals, mut unchanged_deals) = (0, 0, 0);
        let mut errors = Vec::new();
        for raw in raw_deals {
            match self
                .process_deal(raw, source.source_url(), &store_ids, timestamp)
                .await
            {
                Ok(Outcome::Created) => new_deals += 1,
                Ok(Outcome::Updated) => updated_deals += 1,
                Ok(Outcome::Unchanged) => unchanged_deals += 1,
                Err(e) => {
                    tracing::debug!(source = %chain, error = %e, "aggregator: deal rejected");
                    errors.push(e.to_string());
                }
            }
        }

        AggregationResult {
            source: chain,
            success: within_threshold(errors.len(), total, self.config.partial_success_threshold),
            total_processed: total,
            new_deals,
            updated_deals,
            unchanged_deals,
            errors,
            duration_ms: elapsed_ms(started),
            timestamp,
        }
    }

    async fn process_deal(
        &self,
        raw: RawDeal,
        source_url: &str,
        store_ids: &[Uuid],
        now: DateTime<Utc>,
    ) -> Result<Outcome, DealFailure> {
        let canonical = normalize::to_canonical(raw, source_url, now);
        let deal = normalize::normalize(canonical);
        normalize::validate(&deal)?;

        let storage = |source: DbError| DealFailure::Storage {
            title: deal.title.clone(),
            source,
        };

        let existing = self
            .repo
            .find_deal_by_key(deal.chain, &deal.deal_key)
            .await
            .map_err(storage)?;

        if let Some(existing) = existing {
            let update = normalize::material_changes(&existing, &deal);
            // A prior run may have created the row but failed to link it.
            let relink = existing.store_locations.is_empty() && !store_ids.is_empty();
            if update.is_empty() && !relink {
                return Ok(Outcome::Unchanged);
            }
            if !update.is_empty() {
                self.repo
                    .update_deal(existing.id, &update)
                    .await
                    .map_err(storage)?
                    .ok_or_else(|| storage(DbError::NotFound))?;
            }
            if relink {
                tracing::debug!(deal_id = %existing.id, "aggregator: linking unassociated deal");
                self.repo
                    .associate_deal_with_stores(existing.id, store_ids)
                    .await
                    .map_err(storage)?;
            }
            return Ok(Outcome::Updated);
        }

        let created = self.repo.create_deal(&deal).await.map_err(storage)?;
        self.repo
            .associate_deal_with_stores(created.id, store_ids)
            .await
            .map_err(storage)?;
        Ok(Outcome::Created)
    }
}

#[allow(clippy::cast_precision_loss)]
fn within_threshold(failed: usize, total: usize, threshold: f64) -> bool {
    total == 0 || (failed as f64 / total as f64) < threshold
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

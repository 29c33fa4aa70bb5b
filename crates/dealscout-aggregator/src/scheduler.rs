//! Recurring refresh and cleanup triggers.
//!
//! All three jobs are evaluated in UTC and hold only a weak handle to the
//! aggregator, so a dropped aggregator silently ends its schedule.

use std::sync::Weak;

use dealscout_core::AppConfig;
use tokio_cron_scheduler::{Job, JobScheduler};
use uuid::Uuid;

use crate::aggregator::DealAggregator;
use crate::error::AggregatorError;

pub const DEFAULT_KROGER_CRON: &str = "0 0 */4 * * *";
pub const DEFAULT_PUBLIX_CRON: &str = "0 0 */6 * * *";
pub const DEFAULT_CLEANUP_CRON: &str = "0 0 2 * * *";

/// Six-field cron expressions (seconds first) for each trigger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleConfig {
    pub kroger_cron: String,
    pub publix_cron: String,
    pub cleanup_cron: String,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            kroger_cron: DEFAULT_KROGER_CRON.to_string(),
            publix_cron: DEFAULT_PUBLIX_CRON.to_string(),
            cleanup_cron: DEFAULT_CLEANUP_CRON.to_string(),
        }
    }
}

impl ScheduleConfig {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            kroger_cron: config.kroger_refresh_cron.clone(),
            publix_cron: config.publix_refresh_cron.clone(),
            cleanup_cron: config.cleanup_cron.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum ScheduledTask {
    KrogerRefresh,
    PublixRefresh,
    Cleanup,
}

impl ScheduledTask {
    fn name(self) -> &'static str {
        match self {
            ScheduledTask::KrogerRefresh => "kroger-refresh",
            ScheduledTask::PublixRefresh => "publix-refresh",
            ScheduledTask::Cleanup => "cleanup",
        }
    }

    async fn run(self, aggregator: &DealAggregator) {
        match self {
            ScheduledTask::KrogerRefresh => {
                aggregator.aggregate_kroger_deals().await;
            }
            ScheduledTask::PublixRefresh => {
                aggregator.aggregate_publix_deals().await;
            }
            ScheduledTask::Cleanup => {
                aggregator.cleanup_expired_deals().await;
            }
        }
    }
}

/// A running set of triggers. Dropping it without [`DealScheduler::shutdown`]
/// leaves the jobs registered until the runtime exits.
pub struct DealScheduler {
    scheduler: JobScheduler,
    job_ids: Vec<Uuid>,
}

impl DealScheduler {
    /// Validates every expression, registers the three jobs, and starts ticking.
    ///
    /// # Errors
    ///
    /// Returns [`AggregatorError::InvalidSchedule`] for an unparseable cron
    /// expression (before anything is registered) or
    /// [`AggregatorError::Scheduler`] if the scheduler cannot start.
    pub async fn start(
        aggregator: Weak<DealAggregator>,
        config: &ScheduleConfig,
    ) -> Result<Self, AggregatorError> {
        let jobs = [
            (ScheduledTask::KrogerRefresh, config.kroger_cron.as_str()),
            (ScheduledTask::PublixRefresh, config.publix_cron.as_str()),
            (ScheduledTask::Cleanup, config.cleanup_cron.as_str()),
        ]
        .into_iter()
        .map(|(task, cron)| build_job(task, cron, aggregator.clone()))
        .collect::<Result<Vec<_>, _>>()?;

        let scheduler = JobScheduler::new().await?;
        let mut job_ids = Vec::with_capacity(jobs.len());
        for job in jobs {
            job_ids.push(scheduler.add(job).await?);
        }
        scheduler.start().await?;

        tracing::info!(
            kroger = %config.kroger_cron,
            publix = %config.publix_cron,
            cleanup = %config.cleanup_cron,
            "scheduler: started"
        );
        Ok(Self { scheduler, job_ids })
    }

    #[must_use]
    pub fn job_count(&self) -> usize {
        self.job_ids.len()
    }

    /// Removes every job and stops the scheduler.
    ///
    /// # Errors
    ///
    /// Returns [`AggregatorError::Scheduler`] if the scheduler fails to shut down.
    pub async fn shutdown(mut self) -> Result<(), AggregatorError> {
        for id in self.job_ids.drain(..) {
            if let Err(e) = self.scheduler.remove(&id).await {
                tracing::warn!(job = %id, error = %e, "scheduler: failed to remove job");
            }
        }
        self.scheduler.shutdown().await?;
        tracing::info!("scheduler: stopped");
        Ok(())
    }
}

fn build_job(
    task: ScheduledTask,
    cron: &str,
    aggregator: Weak<DealAggregator>,
) -> Result<Job, AggregatorError> {
    Job::new_async(cron, move |_uuid, _lock| {
        let aggregator = aggregator.clone();

        Box::pin(async move {
            let Some(aggregator) = aggregator.upgrade() else {
                tracing::debug!(job = task.name(), "scheduler: aggregator dropped; skipping");
                return;
            };
            tracing::info!(job = task.name(), "scheduler: starting run");
            task.run(&aggregator).await;
            tracing::info!(job = task.name(), "scheduler: run complete");
        })
    })
    .map_err(|e| AggregatorError::InvalidSchedule {
        job: task.name(),
        expression: cron.to_string(),
        reason: e.to_string(),
    })
}

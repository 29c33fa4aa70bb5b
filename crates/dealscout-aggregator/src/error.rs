use thiserror::Error;
use tokio_cron_scheduler::JobSchedulerError;

#[derive(Debug, Error)]
pub enum AggregatorError {
    #[error("a full aggregation run is already in progress")]
    AlreadyRunning,

    #[error("invalid cron expression for {job} job ({expression}): {reason}")]
    InvalidSchedule {
        job: &'static str,
        expression: String,
        reason: String,
    },

    #[error("scheduler error: {0}")]
    Scheduler(#[from] JobSchedulerError),
}

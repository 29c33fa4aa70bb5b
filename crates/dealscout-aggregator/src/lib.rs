//! Deal ingestion: normalize source output, reconcile it with storage, and
//! run the refresh and cleanup schedule.

mod aggregator;
mod error;
pub mod normalize;
mod scheduler;
mod stats;
mod types;

pub use aggregator::{AggregatorConfig, DealAggregator};
pub use error::AggregatorError;
pub use normalize::ValidationError;
pub use scheduler::{DealScheduler, ScheduleConfig};
pub use stats::AggregationStats;
pub use types::{AggregationResult, CleanupResult};

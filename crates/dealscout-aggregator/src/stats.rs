use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::types::AggregationResult;

/// Running totals across every per-source run since startup.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AggregationStats {
    pub last_run: Option<DateTime<Utc>>,
    pub total_runs: u64,
    pub successful_runs: u64,
    pub failed_runs: u64,
    pub total_deals_processed: u64,
    /// Cumulative mean of run durations.
    pub average_processing_time_ms: f64,
}

impl AggregationStats {
    pub(crate) fn record(&mut self, result: &AggregationResult) {
        self.total_runs += 1;
        if result.success {
            self.successful_runs += 1;
        } else {
            self.failed_runs += 1;
        }
        self.total_deals_processed += result.total_processed as u64;

        #[allow(clippy::cast_precision_loss)]
        let (n, sample) = (self.total_runs as f64, result.duration_ms as f64);
        self.average_processing_time_ms =
            (self.average_processing_time_ms * (n - 1.0) + sample) / n;
        self.last_run = Some(result.timestamp);
    }
}

use chrono::{DateTime, Utc};
use dealscout_core::StoreChain;
use serde::Serialize;

/// Outcome of one per-source ingestion run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregationResult {
    pub source: StoreChain,
    pub success: bool,
    pub total_processed: usize,
    pub new_deals: usize,
    pub updated_deals: usize,
    pub unchanged_deals: usize,
    pub errors: Vec<String>,
    pub duration_ms: u64,
    pub timestamp: DateTime<Utc>,
}

impl AggregationResult {
    pub(crate) fn failed(
        source: StoreChain,
        error: String,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            source,
            success: false,
            total_processed: 0,
            new_deals: 0,
            updated_deals: 0,
            unchanged_deals: 0,
            errors: vec![error],
            duration_ms,
            timestamp,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CleanupResult {
    pub expired_found: usize,
    pub deleted: usize,
    pub errors: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use dealscout_aggregator::{AggregatorConfig, AggregatorError, DealAggregator};
use dealscout_core::{Clock, DealType, ManualClock, NewDeal, StoreChain, StoreLocation};
use dealscout_db::MemoryDealRepository;
use dealscout_sources::{DealSource, RawDeal, SourceError};
use uuid::Uuid;

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
}

struct FakeSource {
    chain: StoreChain,
    deals: Mutex<Vec<RawDeal>>,
    fail: Option<String>,
    delay: Option<Duration>,
}

impl FakeSource {
    fn new(chain: StoreChain, deals: Vec<RawDeal>) -> Self {
        Self {
            chain,
            deals: Mutex::new(deals),
            fail: None,
            delay: None,
        }
    }

    fn failing(chain: StoreChain, message: &str) -> Self {
        Self {
            fail: Some(message.to_string()),
            ..Self::new(chain, vec![])
        }
    }

    fn set_deals(&self, deals: Vec<RawDeal>) {
        *self.deals.lock().unwrap() = deals;
    }
}

#[async_trait]
impl DealSource for FakeSource {
    fn chain(&self) -> StoreChain {
        self.chain
    }

    fn source_url(&self) -> &str {
        "https://source.test"
    }

    async fn fetch_raw_deals(&self) -> Result<Vec<RawDeal>, SourceError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(message) = &self.fail {
            return Err(SourceError::ScrapeFailed(message.clone()));
        }
        Ok(self.deals.lock().unwrap().clone())
    }
}

fn kroger_deal(title: &str, sale: f64) -> NewDeal {
    NewDeal {
        chain: StoreChain::Kroger,
        title: title.to_string(),
        description: format!("{title} weekly offer"),
        original_price: 5.00,
        sale_price: sale,
        discount_percentage: 0.0,
        deal_type: DealType::Discount,
        valid_from: start(),
        valid_until: start() + chrono::Duration::days(7),
        category: "Grocery".to_string(),
        item_ids: vec![format!("upc-{}", title.len())],
        restrictions: None,
        image_url: None,
        source_url: None,
        deal_key: String::new(),
    }
}

fn store(chain: StoreChain, name: &str) -> StoreLocation {
    StoreLocation {
        id: Uuid::new_v4(),
        chain,
        name: name.to_string(),
        address: "1 Main St".to_string(),
        latitude: Some(33.75),
        longitude: Some(-84.39),
        weekly_hours: BTreeMap::new(),
        is_active: true,
    }
}

struct Harness {
    clock: Arc<ManualClock>,
    repo: Arc<MemoryDealRepository>,
    kroger: Arc<FakeSource>,
    aggregator: Arc<DealAggregator>,
}

fn harness(kroger: FakeSource, publix: FakeSource) -> Harness {
    let clock = Arc::new(ManualClock::new(start()));
    let repo = Arc::new(MemoryDealRepository::new(clock.clone()));
    let kroger = Arc::new(kroger);
    let aggregator = Arc::new(DealAggregator::new(
        repo.clone(),
        kroger.clone(),
        Arc::new(publix),
        clock.clone() as Arc<dyn Clock>,
        AggregatorConfig::default(),
    ));
    Harness {
        clock,
        repo,
        kroger,
        aggregator,
    }
}

#[tokio::test]
async fn one_invalid_deal_is_recorded_and_the_rest_persist() {
    let mut invalid = kroger_deal("Broken", 2.0);
    invalid.sale_price = 0.0;
    let deals = vec![
        RawDeal::Canonical(kroger_deal("Milk", 2.49)),
        RawDeal::Canonical(kroger_deal("Bread", 1.99)),
        RawDeal::Canonical(invalid),
        RawDeal::Canonical(kroger_deal("Apples", 3.49)),
    ];
    let h = harness(
        FakeSource::new(StoreChain::Kroger, deals),
        FakeSource::new(StoreChain::Publix, vec![]),
    );
    let downtown = store(StoreChain::Kroger, "Downtown");
    h.repo.add_store(downtown.clone());
    h.repo.add_store(store(StoreChain::Publix, "Midtown"));

    let result = h.aggregator.aggregate_kroger_deals().await;

    assert!(result.success);
    assert_eq!(result.total_processed, 4);
    assert_eq!(result.new_deals, 3);
    assert_eq!(result.errors.len(), 1);
    assert!(result.errors[0].contains("sale price must be greater than zero"));

    let stored = h.repo.deals();
    assert_eq!(stored.len(), 3);
    for deal in &stored {
        assert_eq!(deal.source_url.as_deref(), Some("https://source.test"));
        assert_eq!(h.repo.associated_store_ids(deal.id), vec![downtown.id]);
    }
}

#[tokio::test]
async fn untitled_deal_is_rejected_with_title_reason() {
    let deals = vec![
        RawDeal::Canonical(kroger_deal("Milk", 2.49)),
        RawDeal::Canonical(kroger_deal("   ", 1.99)),
        RawDeal::Canonical(kroger_deal("Apples", 3.49)),
    ];
    let h = harness(
        FakeSource::new(StoreChain::Kroger, deals),
        FakeSource::new(StoreChain::Publix, vec![]),
    );

    let result = h.aggregator.aggregate_kroger_deals().await;

    assert!(result.success);
    assert_eq!(result.total_processed, 3);
    assert_eq!(result.new_deals, 2);
    assert_eq!(result.errors.len(), 1);
    assert!(result.errors[0].contains("title is required"));
    assert_eq!(h.repo.deals().len(), 2);
}

#[tokio::test]
async fn sub_cent_sale_price_fails_validation_after_rounding() {
    let h = harness(
        FakeSource::new(
            StoreChain::Kroger,
            vec![RawDeal::Canonical(kroger_deal("Gum", 0.004))],
        ),
        FakeSource::new(StoreChain::Publix, vec![]),
    );

    let result = h.aggregator.aggregate_kroger_deals().await;

    assert_eq!(result.new_deals, 0);
    assert_eq!(result.errors.len(), 1);
    assert!(result.errors[0].contains("sale price must be greater than zero"));
    assert!(h.repo.deals().is_empty());
}

#[tokio::test]
async fn deal_left_unlinked_by_failed_association_is_linked_next_run() {
    let h = harness(
        FakeSource::new(
            StoreChain::Kroger,
            vec![RawDeal::Canonical(kroger_deal("Milk", 2.49))],
        ),
        FakeSource::new(StoreChain::Publix, vec![]),
    );
    let downtown = store(StoreChain::Kroger, "Downtown");
    h.repo.add_store(downtown.clone());
    h.repo.fail_next_associations(1);

    let first = h.aggregator.aggregate_kroger_deals().await;
    assert_eq!(first.new_deals, 0);
    assert_eq!(first.errors.len(), 1);
    assert!(first.errors[0].starts_with("Milk: "));
    let stored = h.repo.deals();
    assert_eq!(stored.len(), 1);
    assert!(h.repo.associated_store_ids(stored[0].id).is_empty());

    let second = h.aggregator.aggregate_kroger_deals().await;
    assert!(second.errors.is_empty());
    assert_eq!(second.updated_deals, 1);
    assert_eq!(h.repo.associated_store_ids(stored[0].id), vec![downtown.id]);

    let third = h.aggregator.aggregate_kroger_deals().await;
    assert_eq!(third.unchanged_deals, 1);
    assert_eq!(h.repo.deals().len(), 1);
}

#[tokio::test]
async fn storage_failure_on_one_deal_does_not_abort_the_batch() {
    let h = harness(
        FakeSource::new(
            StoreChain::Kroger,
            vec![
                RawDeal::Canonical(kroger_deal("Milk", 2.49)),
                RawDeal::Canonical(kroger_deal("Bread", 1.99)),
            ],
        ),
        FakeSource::new(StoreChain::Publix, vec![]),
    );
    h.repo.fail_create_for_title("Milk");

    let result = h.aggregator.aggregate_kroger_deals().await;

    assert_eq!(result.new_deals, 1);
    assert_eq!(result.errors.len(), 1);
    assert!(result.errors[0].starts_with("Milk: "));
    // 1 of 2 failed is not under half
    assert!(!result.success);
}

#[tokio::test]
async fn resighted_deals_update_only_on_material_change() {
    let h = harness(
        FakeSource::new(
            StoreChain::Kroger,
            vec![
                RawDeal::Canonical(kroger_deal("Milk", 2.49)),
                RawDeal::Canonical(kroger_deal("Bread", 1.99)),
            ],
        ),
        FakeSource::new(StoreChain::Publix, vec![]),
    );
    let first = h.aggregator.aggregate_kroger_deals().await;
    assert_eq!(first.new_deals, 2);

    h.kroger.set_deals(vec![
        RawDeal::Canonical(kroger_deal("Milk", 2.19)),
        RawDeal::Canonical(kroger_deal("Bread", 1.994)),
    ]);
    let second = h.aggregator.aggregate_kroger_deals().await;

    assert_eq!(second.new_deals, 0);
    assert_eq!(second.updated_deals, 1);
    assert_eq!(second.unchanged_deals, 1);

    let stored = h.repo.deals();
    assert_eq!(stored.len(), 2);
    let milk = stored.iter().find(|d| d.title == "Milk").unwrap();
    assert!((milk.sale_price - 2.19).abs() < 1e-9);
    assert!((milk.discount_percentage - 56.2).abs() < 1e-9);
}

#[tokio::test]
async fn fetch_failure_produces_failed_result_and_stats() {
    let h = harness(
        FakeSource::failing(StoreChain::Kroger, "upstream down"),
        FakeSource::new(StoreChain::Publix, vec![]),
    );

    let result = h.aggregator.aggregate_kroger_deals().await;

    assert!(!result.success);
    assert_eq!(result.total_processed, 0);
    assert_eq!(result.errors.len(), 1);
    assert!(result.errors[0].contains("upstream down"));

    let stats = h.aggregator.stats();
    assert_eq!(stats.total_runs, 1);
    assert_eq!(stats.failed_runs, 1);
    assert_eq!(stats.last_run, Some(start()));
}

#[tokio::test]
async fn store_lookup_failure_fails_the_run() {
    let h = harness(
        FakeSource::new(StoreChain::Kroger, vec![RawDeal::Canonical(kroger_deal("Milk", 2.49))]),
        FakeSource::new(StoreChain::Publix, vec![]),
    );
    h.repo.fail_store_lookups(true);

    let result = h.aggregator.aggregate_kroger_deals().await;

    assert!(!result.success);
    assert!(h.repo.deals().is_empty());
}

#[tokio::test]
async fn full_run_returns_both_results_and_counts_each_source() {
    let h = harness(
        FakeSource::new(StoreChain::Kroger, vec![RawDeal::Canonical(kroger_deal("Milk", 2.49))]),
        FakeSource::failing(StoreChain::Publix, "browser crashed"),
    );

    let results = h.aggregator.aggregate_all_deals().await.unwrap();

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].source, StoreChain::Kroger);
    assert!(results[0].success);
    assert_eq!(results[1].source, StoreChain::Publix);
    assert!(!results[1].success);

    let stats = h.aggregator.stats();
    assert_eq!(stats.total_runs, 2);
    assert_eq!(stats.successful_runs, 1);
    assert_eq!(stats.failed_runs, 1);
    assert_eq!(stats.total_deals_processed, 1);
    assert!(!h.aggregator.is_aggregation_running());
}

#[tokio::test(start_paused = true)]
async fn concurrent_full_runs_admit_exactly_one() {
    let slow = FakeSource {
        delay: Some(Duration::from_secs(5)),
        ..FakeSource::new(StoreChain::Kroger, vec![RawDeal::Canonical(kroger_deal("Milk", 2.49))])
    };
    let h = harness(slow, FakeSource::new(StoreChain::Publix, vec![]));

    let (a, b) = tokio::join!(
        h.aggregator.aggregate_all_deals(),
        h.aggregator.aggregate_all_deals()
    );

    let ok = [a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count();
    assert_eq!(ok, 1);
    let rejected = if a.is_err() { a } else { b };
    assert!(matches!(rejected, Err(AggregatorError::AlreadyRunning)));
    assert!(!h.aggregator.is_aggregation_running());

    assert!(h.aggregator.aggregate_all_deals().await.is_ok());
}

#[tokio::test]
async fn cleanup_expires_only_past_deals() {
    let h = harness(
        FakeSource::new(
            StoreChain::Kroger,
            vec![RawDeal::Canonical(kroger_deal("Milk", 2.49))],
        ),
        FakeSource::new(StoreChain::Publix, vec![]),
    );
    let mut short = kroger_deal("Bread", 1.99);
    short.valid_until = start() + chrono::Duration::days(1);
    h.kroger.set_deals(vec![
        RawDeal::Canonical(kroger_deal("Milk", 2.49)),
        RawDeal::Canonical(short),
    ]);
    h.aggregator.aggregate_kroger_deals().await;

    h.clock.advance(chrono::Duration::days(2));
    let result = h.aggregator.cleanup_expired_deals().await;

    assert_eq!(result.expired_found, 1);
    assert_eq!(result.deleted, 1);
    assert!(result.errors.is_empty());

    let stored = h.repo.deals();
    let bread = stored.iter().find(|d| d.title == "Bread").unwrap();
    let milk = stored.iter().find(|d| d.title == "Milk").unwrap();
    assert!(!bread.is_active);
    assert!(milk.is_active);

    let again = h.aggregator.cleanup_expired_deals().await;
    assert_eq!(again.expired_found, 0);
}

#[tokio::test]
async fn cleanup_collects_per_deal_failures() {
    let mut a = kroger_deal("Milk", 2.49);
    a.valid_until = start() + chrono::Duration::hours(1);
    let mut b = kroger_deal("Bread", 1.99);
    b.valid_until = start() + chrono::Duration::hours(1);
    let h = harness(
        FakeSource::new(StoreChain::Kroger, vec![RawDeal::Canonical(a), RawDeal::Canonical(b)]),
        FakeSource::new(StoreChain::Publix, vec![]),
    );
    h.aggregator.aggregate_kroger_deals().await;
    let milk_id = h.repo.deals().iter().find(|d| d.title == "Milk").unwrap().id;
    h.repo.fail_delete_for(milk_id);

    h.clock.advance(chrono::Duration::hours(2));
    let result = h.aggregator.cleanup_expired_deals().await;

    assert_eq!(result.expired_found, 2);
    assert_eq!(result.deleted, 1);
    assert_eq!(result.errors.len(), 1);
    assert!(result.errors[0].contains(&milk_id.to_string()));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn scheduler_start_and_stop_are_idempotent() {
    let h = harness(
        FakeSource::new(StoreChain::Kroger, vec![]),
        FakeSource::new(StoreChain::Publix, vec![]),
    );

    h.aggregator.start_scheduled_jobs().await.unwrap();
    h.aggregator.start_scheduled_jobs().await.unwrap();
    assert_eq!(h.aggregator.scheduled_job_count().await, 3);

    h.aggregator.stop_scheduled_jobs().await.unwrap();
    h.aggregator.stop_scheduled_jobs().await.unwrap();
    assert_eq!(h.aggregator.scheduled_job_count().await, 0);

    h.aggregator.start_scheduled_jobs().await.unwrap();
    assert_eq!(h.aggregator.scheduled_job_count().await, 3);
    h.aggregator.stop_scheduled_jobs().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn invalid_cron_is_rejected_without_registering() {
    let clock = Arc::new(ManualClock::new(start()));
    let mut config = AggregatorConfig::default();
    config.schedule.cleanup_cron = "not a cron".to_string();
    let aggregator = Arc::new(DealAggregator::new(
        Arc::new(MemoryDealRepository::new(clock.clone())),
        Arc::new(FakeSource::new(StoreChain::Kroger, vec![])),
        Arc::new(FakeSource::new(StoreChain::Publix, vec![])),
        clock,
        config,
    ));

    let err = aggregator.start_scheduled_jobs().await.unwrap_err();
    assert!(matches!(err, AggregatorError::InvalidSchedule { job: "cleanup", .. }));
    assert_eq!(aggregator.scheduled_job_count().await, 0);
}

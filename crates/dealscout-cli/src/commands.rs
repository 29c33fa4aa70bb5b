use dealscout_core::GeoPoint;
use serde::Serialize;

use crate::services::Services;
use crate::AggregateTarget;

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub(crate) async fn run_aggregate(
    services: &Services,
    target: AggregateTarget,
) -> anyhow::Result<()> {
    let results = match target {
        AggregateTarget::All => services.aggregator.aggregate_all_deals().await?,
        AggregateTarget::Kroger => vec![services.aggregator.aggregate_kroger_deals().await],
        AggregateTarget::Publix => vec![services.aggregator.aggregate_publix_deals().await],
    };
    print_json(&results)?;

    if results.iter().any(|r| !r.success) {
        anyhow::bail!("one or more sources failed; see errors above");
    }
    Ok(())
}

pub(crate) async fn run_cleanup(services: &Services) -> anyhow::Result<()> {
    let result = services.aggregator.cleanup_expired_deals().await;
    print_json(&result)
}

pub(crate) async fn run_compare(
    services: &Services,
    items: &[String],
    location: Option<GeoPoint>,
    radius_miles: Option<f64>,
) -> anyhow::Result<()> {
    if location.is_none() {
        tracing::warn!("no --lat/--lon given; comparisons need a location");
    }
    if let [item] = items {
        let comparison = services
            .engine
            .compare_item_prices(item, location, radius_miles)
            .await?;
        return print_json(&comparison);
    }
    let comparisons = services
        .engine
        .compare_multiple_items(items, location, radius_miles)
        .await?;
    print_json(&comparisons)
}

pub(crate) async fn run_best_store(
    services: &Services,
    items: &[String],
    location: Option<GeoPoint>,
    radius_miles: Option<f64>,
) -> anyhow::Result<()> {
    let plan = services
        .engine
        .get_best_store_for_list(items, location, radius_miles)
        .await?;
    print_json(&plan)
}

/// Starts the schedule, blocks until ctrl-c, then stops it and prints the
/// accumulated run statistics.
pub(crate) async fn run_schedule(services: &Services) -> anyhow::Result<()> {
    services.aggregator.start_scheduled_jobs().await?;
    tracing::info!(
        jobs = services.aggregator.scheduled_job_count().await,
        "schedule running; press ctrl-c to stop"
    );

    tokio::signal::ctrl_c().await?;
    tracing::info!("received shutdown signal, stopping schedule");

    services.aggregator.stop_scheduled_jobs().await?;
    print_json(&services.aggregator.stats())
}

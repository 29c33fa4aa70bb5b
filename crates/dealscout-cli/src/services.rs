//! Wires configuration into the repository, sources, aggregator, and
//! comparison engine.

use std::sync::Arc;

use dealscout_aggregator::{AggregatorConfig, DealAggregator};
use dealscout_compare::{ComparisonPolicy, PriceComparisonEngine};
use dealscout_core::{AppConfig, Clock, SystemClock};
use dealscout_db::{DealRepository, PgDealRepository, PoolConfig};
use dealscout_sources::{KrogerClient, KrogerConfig, PublixSource};

pub(crate) struct Services {
    pub(crate) aggregator: Arc<DealAggregator>,
    pub(crate) engine: PriceComparisonEngine,
    publix: Arc<PublixSource>,
}

impl Services {
    pub(crate) async fn connect(config: &AppConfig) -> anyhow::Result<Self> {
        let pool_config = PoolConfig::from_app_config(config);
        let pool = dealscout_db::connect_pool(&config.database_url, pool_config).await?;
        let version = dealscout_db::server_version(&pool).await?;
        dealscout_db::run_migrations(&pool).await?;
        tracing::debug!(postgres = %version, "database ready");

        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let repo: Arc<dyn DealRepository> = Arc::new(PgDealRepository::new(pool));
        let kroger = Arc::new(KrogerClient::new(KrogerConfig::from_app_config(config))?);
        let publix = Arc::new(PublixSource::from_app_config(config, Arc::clone(&clock)));

        let aggregator = Arc::new(DealAggregator::new(
            Arc::clone(&repo),
            kroger,
            publix.clone(),
            Arc::clone(&clock),
            AggregatorConfig::from_app_config(config),
        ));
        let engine =
            PriceComparisonEngine::new(repo, clock, ComparisonPolicy::from_app_config(config));

        Ok(Self {
            aggregator,
            engine,
            publix,
        })
    }

    /// Releases the scrape browser if one was launched.
    pub(crate) async fn shutdown(&self) {
        if let Err(e) = self.publix.shutdown().await {
            tracing::warn!(error = %e, "failed to close publix browser");
        }
    }
}

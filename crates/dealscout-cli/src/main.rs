mod commands;
mod services;

use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "dealscout")]
#[command(about = "Grocery deal ingestion and price comparison")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Fetch deals from one or both chains and reconcile them with storage
    Aggregate {
        #[arg(value_enum, default_value_t = AggregateTarget::All)]
        target: AggregateTarget,
    },
    /// Expire deals whose validity window has passed
    Cleanup,
    /// Compare prices for one or more items near a location
    Compare {
        /// Item names to search for (e.g. "milk")
        #[arg(required = true)]
        items: Vec<String>,
        #[command(flatten)]
        location: LocationArgs,
    },
    /// Recommend a single chain for a whole shopping list
    BestStore {
        #[arg(required = true)]
        items: Vec<String>,
        #[command(flatten)]
        location: LocationArgs,
    },
    /// Run the refresh and cleanup schedule until interrupted
    Schedule,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum AggregateTarget {
    All,
    Kroger,
    Publix,
}

#[derive(Debug, Clone, Copy, Args)]
pub(crate) struct LocationArgs {
    /// Latitude of the shopper in degrees
    #[arg(long, allow_negative_numbers = true, requires = "lon")]
    lat: Option<f64>,
    /// Longitude of the shopper in degrees
    #[arg(long, allow_negative_numbers = true, requires = "lat")]
    lon: Option<f64>,
    /// Search radius in miles (defaults to DEALSCOUT_DEFAULT_RADIUS_MILES)
    #[arg(long)]
    radius: Option<f64>,
}

impl LocationArgs {
    fn point(self) -> Option<dealscout_core::GeoPoint> {
        Some(dealscout_core::GeoPoint::new(self.lat?, self.lon?))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = dealscout_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let services = services::Services::connect(&config).await?;

    let outcome = match cli.command {
        Commands::Aggregate { target } => commands::run_aggregate(&services, target).await,
        Commands::Cleanup => commands::run_cleanup(&services).await,
        Commands::Compare { items, location } => {
            commands::run_compare(&services, &items, location.point(), location.radius).await
        }
        Commands::BestStore { items, location } => {
            commands::run_best_store(&services, &items, location.point(), location.radius).await
        }
        Commands::Schedule => commands::run_schedule(&services).await,
    };

    services.shutdown().await;
    outcome
}

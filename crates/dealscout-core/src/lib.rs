mod app_config;
mod clock;
mod config;
pub mod deals;
pub mod geo;
pub mod stores;

pub use app_config::{AppConfig, Environment};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{load_app_config, load_app_config_from_env};
pub use deals::{
    discount_percentage, round_cents, Deal, DealType, DealUpdate, NewDeal, StoreChain,
    DEFAULT_CATEGORY,
};
pub use geo::{haversine_miles, GeoPoint, EARTH_RADIUS_MILES};
pub use stores::StoreLocation;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("unknown store chain: {0}")]
    UnknownChain(String),

    #[error("unknown deal type: {0}")]
    UnknownDealType(String),
}

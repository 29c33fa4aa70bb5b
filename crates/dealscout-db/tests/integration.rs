//! Offline tests for dealscout-db pool configuration and row conversions.
//! These tests do not require a live database connection.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::Utc;
use dealscout_core::{AppConfig, Deal, DealType, Environment, StoreChain, StoreLocation};
use dealscout_db::{escape_like, DbError, DealRow, PoolConfig, StoreLocationRow};
use sqlx::types::Json;
use uuid::Uuid;

fn app_config() -> AppConfig {
    AppConfig {
        database_url: "postgres://example".to_string(),
        env: Environment::Test,
        log_level: "info".to_string(),
        db_max_connections: 42,
        db_min_connections: 7,
        db_acquire_timeout_secs: 9,
        kroger_client_id: "id".to_string(),
        kroger_client_secret: "secret".to_string(),
        kroger_api_base_url: "https://api.kroger.com".to_string(),
        kroger_token_url: "https://api.kroger.com/v1/connect/oauth2/token".to_string(),
        kroger_scope: "product.compact".to_string(),
        kroger_location_id: None,
        kroger_rate_limit_per_minute: 100,
        request_timeout_secs: 30,
        user_agent: "ua".to_string(),
        source_max_retries: 3,
        source_backoff_base_ms: 1000,
        publix_headless: true,
        publix_chrome_path: Some(PathBuf::from("/usr/bin/chromium")),
        kroger_refresh_cron: "0 0 */4 * * *".to_string(),
        publix_refresh_cron: "0 0 */6 * * *".to_string(),
        cleanup_cron: "0 0 2 * * *".to_string(),
        partial_success_threshold: 0.5,
        tie_band: 0.5,
        list_tie_band: 2.0,
        default_radius_miles: 10.0,
    }
}

fn deal_row(chain: &str, deal_type: &str) -> DealRow {
    let now = Utc::now();
    DealRow {
        id: Uuid::new_v4(),
        chain: chain.to_string(),
        deal_key: "abc".to_string(),
        title: "Large Eggs".to_string(),
        description: "Dozen".to_string(),
        original_price: 4.0,
        sale_price: 3.0,
        discount_percentage: 25.0,
        deal_type: deal_type.to_string(),
        valid_from: now,
        valid_until: now + chrono::Duration::days(7),
        category: "Dairy".to_string(),
        item_ids: vec!["0001".to_string()],
        restrictions: None,
        image_url: None,
        source_url: None,
        is_active: true,
        created_at: now,
        updated_at: now,
    }
}

#[test]
fn pool_config_from_app_config_uses_core_values() {
    let pool_config = PoolConfig::from_app_config(&app_config());
    assert_eq!(pool_config.max_connections, 42);
    assert_eq!(pool_config.min_connections, 7);
    assert_eq!(pool_config.acquire_timeout_secs, 9);
}

#[test]
fn escape_like_escapes_wildcards() {
    assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
    assert_eq!(escape_like("milk"), "milk");
}

#[test]
fn deal_row_converts_into_domain_deal() {
    let deal = Deal::try_from(deal_row("kroger", "DISCOUNT")).unwrap();
    assert_eq!(deal.chain, StoreChain::Kroger);
    assert_eq!(deal.deal_type, DealType::Discount);
    assert!(deal.store_locations.is_empty());
}

#[test]
fn deal_row_with_unknown_deal_type_is_a_decode_error() {
    let err = Deal::try_from(deal_row("kroger", "CLEARANCE")).unwrap_err();
    assert!(matches!(err, DbError::Decode { column: "deal_type", .. }));
}

#[test]
fn store_row_with_unknown_chain_is_a_decode_error() {
    let row = StoreLocationRow {
        id: Uuid::new_v4(),
        chain: "aldi".to_string(),
        name: "Aldi #1".to_string(),
        address: String::new(),
        latitude: None,
        longitude: None,
        weekly_hours: Json(BTreeMap::new()),
        is_active: true,
    };
    let err = StoreLocation::try_from(row).unwrap_err();
    assert!(matches!(err, DbError::Decode { column: "chain", .. }));
}

use crate::app_config::{AppConfig, Environment};
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the process environment so it can be tested with a plain
/// `HashMap` lookup.
#[allow(clippy::too_many_lines)]
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::path::PathBuf;

    let require = |var: &str| -> Result<String, ConfigError> {
        match lookup(var) {
            Ok(v) if !v.trim().is_empty() => Ok(v),
            _ => Err(ConfigError::MissingEnvVar(var.to_string())),
        }
    };

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason,
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        or_default(var, default)
            .parse::<u32>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        or_default(var, default)
            .parse::<u64>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_f64 = |var: &str, default: &str| -> Result<f64, ConfigError> {
        let value = or_default(var, default)
            .parse::<f64>()
            .map_err(|e| invalid(var, e.to_string()))?;
        if value.is_finite() && value >= 0.0 {
            Ok(value)
        } else {
            Err(invalid(var, format!("must be a non-negative number, got {value}")))
        }
    };

    let parse_bool = |var: &str, default: &str| -> Result<bool, ConfigError> {
        match or_default(var, default).to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" => Ok(true),
            "0" | "false" | "no" => Ok(false),
            other => Err(invalid(var, format!("expected a boolean, got '{other}'"))),
        }
    };

    let non_empty = |var: &str| lookup(var).ok().filter(|v| !v.trim().is_empty());

    let database_url = require("DATABASE_URL")?;
    let kroger_client_id = require("KROGER_CLIENT_ID")?;
    let kroger_client_secret = require("KROGER_CLIENT_SECRET")?;

    let env = parse_environment(&or_default("DEALSCOUT_ENV", "development"))?;
    let log_level = or_default("DEALSCOUT_LOG_LEVEL", "info");

    let db_max_connections = parse_u32("DEALSCOUT_DB_MAX_CONNECTIONS", "10")?;
    let db_min_connections = parse_u32("DEALSCOUT_DB_MIN_CONNECTIONS", "1")?;
    let db_acquire_timeout_secs = parse_u64("DEALSCOUT_DB_ACQUIRE_TIMEOUT_SECS", "10")?;

    let kroger_api_base_url = or_default("KROGER_API_BASE_URL", "https://api.kroger.com");
    let kroger_token_url = or_default(
        "KROGER_TOKEN_URL",
        "https://api.kroger.com/v1/connect/oauth2/token",
    );
    let kroger_scope = or_default("KROGER_SCOPE", "product.compact");
    let kroger_location_id = non_empty("KROGER_LOCATION_ID");
    let kroger_rate_limit_per_minute = parse_u32("KROGER_RATE_LIMIT_PER_MINUTE", "100")?;
    if kroger_rate_limit_per_minute == 0 {
        return Err(invalid(
            "KROGER_RATE_LIMIT_PER_MINUTE",
            "must be at least 1".to_string(),
        ));
    }

    let request_timeout_secs = parse_u64("DEALSCOUT_REQUEST_TIMEOUT_SECS", "30")?;
    let user_agent = or_default("DEALSCOUT_USER_AGENT", "dealscout/0.1 (deal-aggregation)");
    let source_max_retries = parse_u32("DEALSCOUT_SOURCE_MAX_RETRIES", "3")?;
    let source_backoff_base_ms = parse_u64("DEALSCOUT_SOURCE_BACKOFF_BASE_MS", "1000")?;

    let publix_headless = parse_bool("PUBLIX_HEADLESS", "true")?;
    let publix_chrome_path = non_empty("PUBLIX_CHROME_PATH").map(PathBuf::from);

    let kroger_refresh_cron = or_default("DEALSCOUT_KROGER_CRON", "0 0 */4 * * *");
    let publix_refresh_cron = or_default("DEALSCOUT_PUBLIX_CRON", "0 0 */6 * * *");
    let cleanup_cron = or_default("DEALSCOUT_CLEANUP_CRON", "0 0 2 * * *");

    let partial_success_threshold = parse_f64("DEALSCOUT_PARTIAL_SUCCESS_THRESHOLD", "0.5")?;
    if partial_success_threshold > 1.0 {
        return Err(invalid(
            "DEALSCOUT_PARTIAL_SUCCESS_THRESHOLD",
            format!("must be between 0 and 1, got {partial_success_threshold}"),
        ));
    }
    let tie_band = parse_f64("DEALSCOUT_TIE_BAND", "0.50")?;
    let list_tie_band = parse_f64("DEALSCOUT_LIST_TIE_BAND", "2.00")?;
    let default_radius_miles = parse_f64("DEALSCOUT_DEFAULT_RADIUS_MILES", "10")?;

    Ok(AppConfig {
        database_url,
        env,
        log_level,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs,
        kroger_client_id,
        kroger_client_secret,
        kroger_api_base_url,
        kroger_token_url,
        kroger_scope,
        kroger_location_id,
        kroger_rate_limit_per_minute,
        request_timeout_secs,
        user_agent,
        source_max_retries,
        source_backoff_base_ms,
        publix_headless,
        publix_chrome_path,
        kroger_refresh_cron,
        publix_refresh_cron,
        cleanup_cron,
        partial_success_threshold,
        tie_band,
        list_tie_band,
        default_radius_miles,
    })
}

/// Parse a string into an `Environment` variant.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidEnvVar`] for anything other than
/// `development`, `test`, or `production`.
fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "DEALSCOUT_ENV".to_string(),
            reason: format!("unknown environment '{other}'"),
        }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;

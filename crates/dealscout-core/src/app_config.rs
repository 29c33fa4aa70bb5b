use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub env: Environment,
    pub log_level: String,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,

    pub kroger_client_id: String,
    pub kroger_client_secret: String,
    pub kroger_api_base_url: String,
    pub kroger_token_url: String,
    pub kroger_scope: String,
    pub kroger_location_id: Option<String>,
    pub kroger_rate_limit_per_minute: u32,

    pub request_timeout_secs: u64,
    pub user_agent: String,
    pub source_max_retries: u32,
    pub source_backoff_base_ms: u64,

    pub publix_headless: bool,
    pub publix_chrome_path: Option<PathBuf>,

    /// Six-field cron expressions (`sec min hour dom mon dow`), evaluated in UTC.
    pub kroger_refresh_cron: String,
    pub publix_refresh_cron: String,
    pub cleanup_cron: String,

    /// A run succeeds only while `failed / total` stays below this ratio.
    pub partial_success_threshold: f64,
    /// Price gap (dollars) within which a closer store wins a single-item comparison.
    pub tie_band: f64,
    /// Total-cost gap (dollars) within which a closer store wins a list comparison.
    pub list_tie_band: f64,
    pub default_radius_miles: f64,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("log_level", &self.log_level)
            .field("database_url", &"[redacted]")
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field("kroger_client_id", &self.kroger_client_id)
            .field("kroger_client_secret", &"[redacted]")
            .field("kroger_api_base_url", &self.kroger_api_base_url)
            .field("kroger_token_url", &self.kroger_token_url)
            .field("kroger_scope", &self.kroger_scope)
            .field("kroger_location_id", &self.kroger_location_id)
            .field(
                "kroger_rate_limit_per_minute",
                &self.kroger_rate_limit_per_minute,
            )
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("user_agent", &self.user_agent)
            .field("source_max_retries", &self.source_max_retries)
            .field("source_backoff_base_ms", &self.source_backoff_base_ms)
            .field("publix_headless", &self.publix_headless)
            .field("publix_chrome_path", &self.publix_chrome_path)
            .field("kroger_refresh_cron", &self.kroger_refresh_cron)
            .field("publix_refresh_cron", &self.publix_refresh_cron)
            .field("cleanup_cron", &self.cleanup_cron)
            .field("partial_success_threshold", &self.partial_success_threshold)
            .field("tie_band", &self.tie_band)
            .field("list_tie_band", &self.list_tie_band)
            .field("default_radius_miles", &self.default_radius_miles)
            .finish()
    }
}

//! Authenticated, rate-limited client for the Kroger coupon and promotion APIs.

mod mapping;
mod rate_limit;
mod token;
mod types;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dealscout_core::{AppConfig, NewDeal, StoreChain};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::error::SourceError;
use crate::retry::retry_with_backoff;
use crate::source::{DealSource, RawDeal};

pub use mapping::{coupon_to_deal, promotion_to_deals};
pub use rate_limit::RateGovernor;
pub use token::TOKEN_EXPIRY_BUFFER;
pub use types::{
    CouponValueType, DataEnvelope, KrogerCoupon, KrogerPromotion, PromotionItem, TokenResponse,
};

use token::CachedToken;

/// Connection and credential settings for [`KrogerClient`].
#[derive(Clone)]
pub struct KrogerConfig {
    pub client_id: String,
    pub client_secret: String,
    pub api_base_url: String,
    pub token_url: String,
    pub scope: String,
    pub location_id: Option<String>,
    pub rate_limit_per_minute: u32,
    pub timeout_secs: u64,
    pub user_agent: String,
    pub max_retries: u32,
    pub backoff_base_ms: u64,
}

impl KrogerConfig {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            client_id: config.kroger_client_id.clone(),
            client_secret: config.kroger_client_secret.clone(),
            api_base_url: config.kroger_api_base_url.clone(),
            token_url: config.kroger_token_url.clone(),
            scope: config.kroger_scope.clone(),
            location_id: config.kroger_location_id.clone(),
            rate_limit_per_minute: config.kroger_rate_limit_per_minute,
            timeout_secs: config.request_timeout_secs,
            user_agent: config.user_agent.clone(),
            max_retries: config.source_max_retries,
            backoff_base_ms: config.source_backoff_base_ms,
        }
    }
}

impl std::fmt::Debug for KrogerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KrogerConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[redacted]")
            .field("api_base_url", &self.api_base_url)
            .field("token_url", &self.token_url)
            .field("scope", &self.scope)
            .field("location_id", &self.location_id)
            .field("rate_limit_per_minute", &self.rate_limit_per_minute)
            .finish_non_exhaustive()
    }
}

fn check_url(url: &str) -> Result<(), SourceError> {
    let invalid = |reason: String| SourceError::InvalidUrl {
        url: url.to_owned(),
        reason,
    };
    let parsed = reqwest::Url::parse(url).map_err(|e| invalid(e.to_string()))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(invalid(format!("unsupported scheme '{other}'"))),
    }
}

/// Client for Kroger's coupon and promotion endpoints.
///
/// The bearer token is fetched lazily, cached until a minute before expiry,
/// and refreshed once on a 401. Every API call (token requests excluded)
/// passes through a [`RateGovernor`].
pub struct KrogerClient {
    http: Client,
    config: KrogerConfig,
    token: Mutex<Option<CachedToken>>,
    governor: Arc<RateGovernor>,
}

impl KrogerClient {
    /// # Errors
    ///
    /// Returns [`SourceError::InvalidUrl`] for a malformed endpoint URL, or
    /// [`SourceError::Http`] if the `reqwest::Client` cannot be built.
    pub fn new(config: KrogerConfig) -> Result<Self, SourceError> {
        let governor = Arc::new(RateGovernor::per_minute(config.rate_limit_per_minute));
        Self::with_governor(config, governor)
    }

    /// Builds a client that shares `governor` with other callers.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::InvalidUrl`] if the API or token URL is not an
    /// absolute http(s) URL, or [`SourceError::Http`] if the `reqwest::Client`
    /// cannot be built.
    pub fn with_governor(
        config: KrogerConfig,
        governor: Arc<RateGovernor>,
    ) -> Result<Self, SourceError> {
        check_url(&config.api_base_url)?;
        check_url(&config.token_url)?;
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(config.user_agent.as_str())
            .build()?;
        Ok(Self {
            http,
            config,
            token: Mutex::new(None),
            governor,
        })
    }

    #[must_use]
    pub fn api_base_url(&self) -> &str {
        &self.config.api_base_url
    }

    /// Fetches digital coupons and prices them. Coupons without a regular
    /// price are skipped.
    ///
    /// # Errors
    ///
    /// Returns the last [`SourceError`] once retries are exhausted.
    pub async fn fetch_coupons(&self) -> Result<Vec<NewDeal>, SourceError> {
        let envelope: DataEnvelope<KrogerCoupon> = self.get_json("/v1/coupons").await?;
        let total = envelope.data.len();
        let deals: Vec<NewDeal> = envelope
            .data
            .iter()
            .filter_map(|coupon| {
                let deal = coupon_to_deal(coupon);
                if deal.is_none() {
                    tracing::debug!(coupon_id = %coupon.id, "coupon has no regular price, skipping");
                }
                deal
            })
            .collect();
        tracing::info!(total, priced = deals.len(), "fetched kroger coupons");
        Ok(deals)
    }

    /// Fetches promotions, one deal per promoted item.
    ///
    /// # Errors
    ///
    /// Returns the last [`SourceError`] once retries are exhausted.
    pub async fn fetch_promotions(&self) -> Result<Vec<NewDeal>, SourceError> {
        let envelope: DataEnvelope<KrogerPromotion> = self.get_json("/v1/promotions").await?;
        let deals: Vec<NewDeal> = envelope.data.iter().flat_map(promotion_to_deals).collect();
        tracing::info!(
            promotions = envelope.data.len(),
            deals = deals.len(),
            "fetched kroger promotions"
        );
        Ok(deals)
    }

    /// Fetches coupons and promotions concurrently and merges them.
    ///
    /// Either endpoint may fail on its own; the failure is logged and the
    /// other half is returned.
    ///
    /// # Errors
    ///
    /// Returns the coupon error when both endpoints fail.
    pub async fn fetch_deals(&self) -> Result<Vec<NewDeal>, SourceError> {
        let (coupons, promotions) = tokio::join!(self.fetch_coupons(), self.fetch_promotions());
        match (coupons, promotions) {
            (Ok(mut coupons), Ok(promotions)) => {
                coupons.extend(promotions);
                Ok(coupons)
            }
            (Ok(coupons), Err(err)) => {
                tracing::error!(error = %err, "kroger promotions fetch failed");
                Ok(coupons)
            }
            (Err(err), Ok(promotions)) => {
                tracing::error!(error = %err, "kroger coupons fetch failed");
                Ok(promotions)
            }
            (Err(coupon_err), Err(promo_err)) => {
                tracing::error!(error = %promo_err, "kroger promotions fetch failed");
                Err(coupon_err)
            }
        }
    }

    /// Returns a cached token or exchanges client credentials for a new one.
    async fn access_token(&self) -> Result<String, SourceError> {
        let mut slot = self.token.lock().await;
        if let Some(token) = slot.as_ref().filter(|t| t.is_fresh(Instant::now())) {
            return Ok(token.access_token().to_owned());
        }
        let fresh = self.authenticate().await?;
        let access_token = fresh.access_token().to_owned();
        *slot = Some(fresh);
        Ok(access_token)
    }

    async fn invalidate_token(&self) {
        *self.token.lock().await = None;
    }

    async fn authenticate(&self) -> Result<CachedToken, SourceError> {
        let issued_at = Instant::now();
        let response = self
            .http
            .post(&self.config.token_url)
            .basic_auth(&self.config.client_id, Some(&self.config.client_secret))
            .form(&[
                ("grant_type", "client_credentials"),
                ("scope", self.config.scope.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(SourceError::Authentication {
                status: status.as_u16(),
                message,
            });
        }

        let body = response.text().await?;
        let token: TokenResponse =
            serde_json::from_str(&body).map_err(|e| SourceError::Deserialize {
                context: "kroger token response".to_owned(),
                source: e,
            })?;
        tracing::debug!(expires_in = token.expires_in, "kroger token issued");
        Ok(CachedToken::new(
            token.access_token,
            Duration::from_secs(token.expires_in),
            issued_at,
        ))
    }

    fn endpoint_url(&self, path: &str) -> String {
        format!("{}{path}", self.config.api_base_url.trim_end_matches('/'))
    }

    /// GETs `path` with retry, bearer auth and one re-authentication on 401.
    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, SourceError> {
        let url = self.endpoint_url(path);
        retry_with_backoff(self.config.max_retries, self.config.backoff_base_ms, || {
            let url = url.clone();
            async move {
                let mut response = self.send_authorized(&url).await?;
                if response.status() == StatusCode::UNAUTHORIZED {
                    tracing::warn!(url = %url, "kroger rejected token, re-authenticating");
                    self.invalidate_token().await;
                    response = self.send_authorized(&url).await?;
                    if response.status() == StatusCode::UNAUTHORIZED {
                        let message = response.text().await.unwrap_or_default();
                        return Err(SourceError::Authentication {
                            status: StatusCode::UNAUTHORIZED.as_u16(),
                            message,
                        });
                    }
                }

                let status = response.status();
                if status == StatusCode::TOO_MANY_REQUESTS {
                    return Err(SourceError::RateLimited { url });
                }
                if !status.is_success() {
                    return Err(SourceError::UnexpectedStatus {
                        status: status.as_u16(),
                        url,
                    });
                }

                let body = response.text().await?;
                serde_json::from_str::<T>(&body).map_err(|e| SourceError::Deserialize {
                    context: url.clone(),
                    source: e,
                })
            }
        })
        .await
    }

    async fn send_authorized(&self, url: &str) -> Result<reqwest::Response, SourceError> {
        let token = self.access_token().await?;
        self.governor.acquire().await;
        let mut request = self.http.get(url).bearer_auth(token);
        if let Some(location_id) = &self.config.location_id {
            request = request.query(&[("filter.locationId", location_id.as_str())]);
        }
        Ok(request.send().await?)
    }
}

#[async_trait]
impl DealSource for KrogerClient {
    fn chain(&self) -> StoreChain {
        StoreChain::Kroger
    }

    fn source_url(&self) -> &str {
        self.api_base_url()
    }

    async fn fetch_raw_deals(&self) -> Result<Vec<RawDeal>, SourceError> {
        let deals = self.fetch_deals().await?;
        Ok(deals.into_iter().map(RawDeal::Canonical).collect())
    }
}

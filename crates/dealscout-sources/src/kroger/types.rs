//! Wire types for the Kroger coupon, promotion and token endpoints.

use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Standard `{"data": [...]}` envelope.
#[derive(Debug, Deserialize)]
pub struct DataEnvelope<T> {
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CouponValueType {
    DollarOff,
    PercentOff,
    Bogo,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KrogerCoupon {
    pub id: String,
    pub description: String,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    pub value: f64,
    pub value_type: CouponValueType,
    #[serde(default)]
    pub regular_price: Option<f64>,
    pub start_date: DateTime<Utc>,
    pub expiration_date: DateTime<Utc>,
    #[serde(default)]
    pub upcs: Vec<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub terms: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KrogerPromotion {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    #[serde(default)]
    pub terms: Option<String>,
    #[serde(default)]
    pub items: Vec<PromotionItem>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromotionItem {
    pub upc: String,
    #[serde(default)]
    pub description: Option<String>,
    pub regular_price: f64,
    pub promo_price: f64,
    #[serde(default)]
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    /// Lifetime in seconds.
    pub expires_in: u64,
    #[serde(default)]
    pub token_type: Option<String>,
}

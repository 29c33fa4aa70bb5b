//! Row types for the `deals` and `store_locations` tables.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use dealscout_core::{Deal, DealType, StoreChain, StoreLocation};
use sqlx::types::Json;
use uuid::Uuid;

use crate::DbError;

/// Column list shared by every `deals` read. Money columns are cast to
/// `float8` so they decode straight into `f64`.
pub(crate) const DEAL_COLUMNS: &str = "d.id, d.chain, d.deal_key, d.title, d.description, \
     d.original_price::float8 AS original_price, \
     d.sale_price::float8 AS sale_price, \
     d.discount_percentage::float8 AS discount_percentage, \
     d.deal_type, d.valid_from, d.valid_until, d.category, d.item_ids, \
     d.restrictions, d.image_url, d.source_url, d.is_active, \
     d.created_at, d.updated_at";

pub(crate) const STORE_COLUMNS: &str = "sl.id, sl.chain, sl.name, sl.address, \
     sl.latitude, sl.longitude, sl.weekly_hours, sl.is_active";

/// A row from the `deals` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DealRow {
    pub id: Uuid,
    pub chain: String,
    pub deal_key: String,
    pub title: String,
    pub description: String,
    pub original_price: f64,
    pub sale_price: f64,
    pub discount_percentage: f64,
    pub deal_type: String,
    pub valid_from: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
    pub category: String,
    pub item_ids: Vec<String>,
    pub restrictions: Option<String>,
    pub image_url: Option<String>,
    pub source_url: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A row from the `store_locations` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StoreLocationRow {
    pub id: Uuid,
    pub chain: String,
    pub name: String,
    pub address: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub weekly_hours: Json<BTreeMap<String, String>>,
    pub is_active: bool,
}

/// A store row tagged with the deal it was joined through.
#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct LinkedStoreRow {
    pub deal_id: Uuid,
    #[sqlx(flatten)]
    pub store: StoreLocationRow,
}

fn decode_chain(raw: &str) -> Result<StoreChain, DbError> {
    raw.parse().map_err(|e: dealscout_core::CoreError| DbError::Decode {
        column: "chain",
        reason: e.to_string(),
    })
}

impl TryFrom<StoreLocationRow> for StoreLocation {
    type Error = DbError;

    fn try_from(row: StoreLocationRow) -> Result<Self, Self::Error> {
        Ok(StoreLocation {
            id: row.id,
            chain: decode_chain(&row.chain)?,
            name: row.name,
            address: row.address,
            latitude: row.latitude,
            longitude: row.longitude,
            weekly_hours: row.weekly_hours.0,
            is_active: row.is_active,
        })
    }
}

impl TryFrom<DealRow> for Deal {
    type Error = DbError;

    fn try_from(row: DealRow) -> Result<Self, Self::Error> {
        let deal_type: DealType = row.deal_type.parse().map_err(
            |e: dealscout_core::CoreError| DbError::Decode {
                column: "deal_type",
                reason: e.to_string(),
            },
        )?;
        Ok(Deal {
            id: row.id,
            chain: decode_chain(&row.chain)?,
            title: row.title,
            description: row.description,
            original_price: row.original_price,
            sale_price: row.sale_price,
            discount_percentage: row.discount_percentage,
            deal_type,
            valid_from: row.valid_from,
            valid_until: row.valid_until,
            category: row.category,
            item_ids: row.item_ids,
            restrictions: row.restrictions,
            image_url: row.image_url,
            source_url: row.source_url,
            deal_key: row.deal_key,
            is_active: row.is_active,
            store_locations: Vec::new(),
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Escapes `%`, `_` and `\` so user text matches literally inside `ILIKE`.
#[must_use]
pub fn escape_like(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

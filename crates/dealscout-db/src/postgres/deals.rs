//! Queries against the `deals` table.

use chrono::{DateTime, Utc};
use dealscout_core::{DealUpdate, NewDeal, StoreChain};
use sqlx::PgPool;
use uuid::Uuid;

use super::types::{escape_like, DealRow, DEAL_COLUMNS};
use crate::repository::NearbyDealsQuery;
use crate::DbError;

pub(crate) async fn insert_deal(pool: &PgPool, deal: &NewDeal) -> Result<DealRow, DbError> {
    let sql = format!(
        "INSERT INTO deals AS d \
             (id, chain, deal_key, title, description, original_price, sale_price, \
              discount_percentage, deal_type, valid_from, valid_until, category, item_ids, \
              restrictions, image_url, source_url) \
         VALUES ($1, $2, $3, $4, $5, $6::numeric, $7::numeric, $8::numeric, $9, $10, $11, \
                 $12, $13, $14, $15, $16) \
         RETURNING {DEAL_COLUMNS}"
    );
    let row = sqlx::query_as::<_, DealRow>(&sql)
        .bind(Uuid::new_v4())
        .bind(deal.chain.as_str())
        .bind(&deal.deal_key)
        .bind(&deal.title)
        .bind(&deal.description)
        .bind(deal.original_price)
        .bind(deal.sale_price)
        .bind(deal.discount_percentage)
        .bind(deal.deal_type.as_str())
        .bind(deal.valid_from)
        .bind(deal.valid_until)
        .bind(&deal.category)
        .bind(&deal.item_ids)
        .bind(deal.restrictions.as_deref())
        .bind(deal.image_url.as_deref())
        .bind(deal.source_url.as_deref())
        .fetch_one(pool)
        .await?;
    Ok(row)
}

/// `None` fields keep the stored value. The nullable columns carry a
/// separate "touch" flag so `Some(None)` can clear them.
pub(crate) async fn update_deal(
    pool: &PgPool,
    id: Uuid,
    update: &DealUpdate,
) -> Result<Option<DealRow>, DbError> {
    let sql = format!(
        "UPDATE deals AS d SET \
             title               = COALESCE($2, d.title), \
             description         = COALESCE($3, d.description), \
             original_price      = COALESCE($4::numeric, d.original_price), \
             sale_price          = COALESCE($5::numeric, d.sale_price), \
             discount_percentage = COALESCE($6::numeric, d.discount_percentage), \
             valid_from          = COALESCE($7, d.valid_from), \
             valid_until         = COALESCE($8, d.valid_until), \
             restrictions        = CASE WHEN $9 THEN $10 ELSE d.restrictions END, \
             image_url           = CASE WHEN $11 THEN $12 ELSE d.image_url END, \
             updated_at          = NOW() \
         WHERE d.id = $1 \
         RETURNING {DEAL_COLUMNS}"
    );
    let row = sqlx::query_as::<_, DealRow>(&sql)
        .bind(id)
        .bind(update.title.as_deref())
        .bind(update.description.as_deref())
        .bind(update.original_price)
        .bind(update.sale_price)
        .bind(update.discount_percentage)
        .bind(update.valid_from)
        .bind(update.valid_until)
        .bind(update.restrictions.is_some())
        .bind(update.restrictions.clone().flatten())
        .bind(update.image_url.is_some())
        .bind(update.image_url.clone().flatten())
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

pub(crate) async fn find_by_key(
    pool: &PgPool,
    chain: StoreChain,
    deal_key: &str,
) -> Result<Option<DealRow>, DbError> {
    let sql = format!(
        "SELECT {DEAL_COLUMNS} FROM deals d \
         WHERE d.chain = $1 AND d.deal_key = $2 AND d.is_active = TRUE"
    );
    let row = sqlx::query_as::<_, DealRow>(&sql)
        .bind(chain.as_str())
        .bind(deal_key)
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

pub(crate) async fn find_expired(
    pool: &PgPool,
    now: DateTime<Utc>,
) -> Result<Vec<DealRow>, DbError> {
    let sql = format!(
        "SELECT {DEAL_COLUMNS} FROM deals d \
         WHERE d.is_active = TRUE AND d.valid_until < $1 \
         ORDER BY d.valid_until ASC"
    );
    let rows = sqlx::query_as::<_, DealRow>(&sql)
        .bind(now)
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

pub(crate) async fn deactivate(pool: &PgPool, id: Uuid) -> Result<bool, DbError> {
    let result = sqlx::query(
        "UPDATE deals SET is_active = FALSE, updated_at = NOW() \
         WHERE id = $1 AND is_active = TRUE",
    )
    .bind(id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Great-circle distance is computed in SQL with the same haversine form the
/// core crate uses, so both repositories agree on the radius boundary.
pub(crate) async fn find_active_near(
    pool: &PgPool,
    query: &NearbyDealsQuery,
) -> Result<Vec<DealRow>, DbError> {
    let pattern = query
        .search
        .as_deref()
        .map(|s| format!("%{}%", escape_like(s)));
    let limit = i64::try_from(query.limit).unwrap_or(i64::MAX);

    let sql = format!(
        "WITH nearby AS ( \
             SELECT DISTINCT dsl.deal_id \
             FROM deal_store_locations dsl \
             JOIN store_locations sl ON sl.id = dsl.store_location_id \
             WHERE sl.is_active = TRUE \
               AND sl.latitude IS NOT NULL \
               AND sl.longitude IS NOT NULL \
               AND 2 * $3 * ASIN(LEAST(1.0, SQRT( \
                     POWER(SIN(RADIANS(sl.latitude - $1) / 2), 2) \
                   + COS(RADIANS($1)) * COS(RADIANS(sl.latitude)) \
                   * POWER(SIN(RADIANS(sl.longitude - $2) / 2), 2)))) <= $4 \
         ) \
         SELECT {DEAL_COLUMNS} FROM deals d \
         JOIN nearby n ON n.deal_id = d.id \
         WHERE d.is_active = TRUE \
           AND d.valid_until > $5 \
           AND ($6::text IS NULL OR d.title ILIKE $6 OR d.description ILIKE $6) \
         ORDER BY d.sale_price ASC, d.id \
         LIMIT $7"
    );
    let rows = sqlx::query_as::<_, DealRow>(&sql)
        .bind(query.point.latitude)
        .bind(query.point.longitude)
        .bind(dealscout_core::EARTH_RADIUS_MILES)
        .bind(query.radius_miles)
        .bind(query.now)
        .bind(pattern)
        .bind(limit)
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

//! Queries against `store_locations` and the deal/store join table.

use dealscout_core::StoreChain;
use sqlx::PgPool;
use uuid::Uuid;

use super::types::{LinkedStoreRow, StoreLocationRow, STORE_COLUMNS};
use crate::DbError;

pub(crate) async fn find_by_chain(
    pool: &PgPool,
    chain: StoreChain,
) -> Result<Vec<StoreLocationRow>, DbError> {
    let sql = format!(
        "SELECT {STORE_COLUMNS} FROM store_locations sl \
         WHERE sl.chain = $1 AND sl.is_active = TRUE \
         ORDER BY sl.name"
    );
    let rows = sqlx::query_as::<_, StoreLocationRow>(&sql)
        .bind(chain.as_str())
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

/// Store rows for every deal in `deal_ids`, each tagged with its deal.
pub(crate) async fn find_linked(
    pool: &PgPool,
    deal_ids: &[Uuid],
) -> Result<Vec<LinkedStoreRow>, DbError> {
    if deal_ids.is_empty() {
        return Ok(Vec::new());
    }
    let sql = format!(
        "SELECT dsl.deal_id, {STORE_COLUMNS} \
         FROM deal_store_locations dsl \
         JOIN store_locations sl ON sl.id = dsl.store_location_id \
         WHERE dsl.deal_id = ANY($1) \
         ORDER BY sl.name"
    );
    let rows = sqlx::query_as::<_, LinkedStoreRow>(&sql)
        .bind(deal_ids)
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

/// Replaces the deal's associations inside one transaction.
pub(crate) async fn replace_links(
    pool: &PgPool,
    deal_id: Uuid,
    store_location_ids: &[Uuid],
) -> Result<(), DbError> {
    let mut tx = pool.begin().await?;

    let exists = sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM deals WHERE id = $1)")
        .bind(deal_id)
        .fetch_one(&mut *tx)
        .await?;
    if !exists {
        return Err(DbError::NotFound);
    }

    sqlx::query("DELETE FROM deal_store_locations WHERE deal_id = $1")
        .bind(deal_id)
        .execute(&mut *tx)
        .await?;

    if !store_location_ids.is_empty() {
        sqlx::query(
            "INSERT INTO deal_store_locations (deal_id, store_location_id) \
             SELECT $1, s FROM UNNEST($2::uuid[]) AS s \
             ON CONFLICT DO NOTHING",
        )
        .bind(deal_id)
        .bind(store_location_ids)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(())
}

//! Users, trips, and raw payload persistence.

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};

use crate::types::TripPayload;

/// Persist everything the upload handler stores, inside one transaction:
/// the user row, the trip metadata (upsert by trip id), and the verbatim
/// raw payload. Keeping the raw JSON makes reprocessing safe even when a
/// later pipeline job fails.
pub async fn store_upload(
    tx: &mut Transaction<'_, Postgres>,
    payload: &TripPayload,
    raw: &serde_json::Value,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO users (user_id) VALUES ($1) \
         ON CONFLICT (user_id) DO NOTHING",
    )
    .bind(&payload.user_id)
    .execute(&mut **tx)
    .await?;

    let sample_count = payload
        .sample_count
        .unwrap_or(payload.samples.len() as i64);

    sqlx::query(
        r#"INSERT INTO trips (trip_id, user_id, start_time, end_time, sample_count)
           VALUES ($1, $2, $3, $4, $5)
           ON CONFLICT (trip_id) DO UPDATE
           SET user_id      = EXCLUDED.user_id,
               start_time   = EXCLUDED.start_time,
               end_time     = EXCLUDED.end_time,
               sample_count = EXCLUDED.sample_count,
               created_at   = NOW()"#,
    )
    .bind(&payload.trip_id)
    .bind(&payload.user_id)
    .bind(payload.start_time)
    .bind(payload.end_time)
    .bind(sample_count)
    .execute(&mut **tx)
    .await?;

    sqlx::query(
        r#"INSERT INTO trip_raw (trip_id, payload)
           VALUES ($1, $2)
           ON CONFLICT (trip_id) DO UPDATE
           SET payload    = EXCLUDED.payload,
               created_at = NOW()"#,
    )
    .bind(&payload.trip_id)
    .bind(raw)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

/// Load the stored raw payload for a trip, if any.
pub async fn fetch_raw_payload(
    pool: &PgPool,
    trip_id: &str,
) -> Result<Option<serde_json::Value>, sqlx::Error> {
    let row: Option<(serde_json::Value,)> =
        sqlx::query_as("SELECT payload FROM trip_raw WHERE trip_id = $1")
            .bind(trip_id)
            .fetch_optional(pool)
            .await?;
    Ok(row.map(|(payload,)| payload))
}

/// Global trip count — the denominator of cluster coverage.
pub async fn total_trips(pool: &PgPool) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM trips")
        .fetch_one(pool)
        .await
}

/// Trip metadata as stored.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TripRow {
    pub trip_id: String,
    pub user_id: String,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub sample_count: Option<i64>,
}

/// Look up one trip's metadata.
pub async fn fetch_trip(pool: &PgPool, trip_id: &str) -> Result<Option<TripRow>, sqlx::Error> {
    sqlx::query_as(
        "SELECT trip_id, user_id, start_time, end_time, sample_count \
         FROM trips WHERE trip_id = $1",
    )
    .bind(trip_id)
    .fetch_optional(pool)
    .await
}

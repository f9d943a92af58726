//! Detection persistence — transactional per-trip writes and snapshot
//! reads for aggregation and the raw-detections API.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{PgPool, Postgres, Transaction};

use crate::types::{Detection, DetectionPoint};

/// Replace a trip's detections inside the caller's transaction.
///
/// Delete-then-insert keeps reprocessing idempotent; the `(trip_id, ts)`
/// unique key plus `ON CONFLICT DO NOTHING` absorbs racing duplicates.
/// Partial detection sets are never observable because the caller commits
/// segments and detections together.
pub async fn replace_for_trip(
    tx: &mut Transaction<'_, Postgres>,
    trip_id: &str,
    detections: &[Detection],
) -> Result<u64, sqlx::Error> {
    sqlx::query("DELETE FROM detections WHERE trip_id = $1")
        .bind(trip_id)
        .execute(&mut **tx)
        .await?;

    let mut written = 0u64;
    for d in detections {
        let result = sqlx::query(
            r#"INSERT INTO detections
               (trip_id, ts, latitude, longitude, intensity, stability, mount_state)
               VALUES ($1, $2, $3, $4, $5, $6, $7)
               ON CONFLICT (trip_id, ts) DO NOTHING"#,
        )
        .bind(trip_id)
        .bind(d.ts)
        .bind(d.lat)
        .bind(d.lon)
        .bind(d.intensity)
        .bind(d.stability)
        .bind(d.mount_state.as_str())
        .execute(&mut **tx)
        .await?;
        written += result.rows_affected();
    }

    Ok(written)
}

/// Snapshot of all geolocated detections joined with their owning trip,
/// the input to cross-trip clustering.
pub async fn fetch_geolocated(pool: &PgPool) -> Result<Vec<DetectionPoint>, sqlx::Error> {
    let rows: Vec<(String, String, DateTime<Utc>, f64, f64, f64, f64)> = sqlx::query_as(
        r#"SELECT d.trip_id, t.user_id, d.ts, d.latitude, d.longitude,
                  d.intensity, d.stability
           FROM detections d
           JOIN trips t ON t.trip_id = d.trip_id
           WHERE d.latitude IS NOT NULL AND d.longitude IS NOT NULL
           ORDER BY d.ts"#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(
            |(trip_id, user_id, ts, lat, lon, intensity, stability)| DetectionPoint {
                trip_id,
                user_id,
                ts,
                lat,
                lon,
                intensity,
                stability,
            },
        )
        .collect())
}

/// One raw detection as served by the API.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct DetectionRow {
    pub trip_id: String,
    pub ts: DateTime<Utc>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub intensity: f64,
    pub stability: f64,
    pub mount_state: String,
}

/// Raw detections, newest first.
pub async fn fetch_recent(
    pool: &PgPool,
    min_intensity: f64,
    limit: i64,
) -> Result<Vec<DetectionRow>, sqlx::Error> {
    sqlx::query_as(
        r#"SELECT trip_id, ts, latitude, longitude, intensity, stability, mount_state
           FROM detections
           WHERE intensity >= $1
           ORDER BY ts DESC
           LIMIT $2"#,
    )
    .bind(min_intensity)
    .bind(limit)
    .fetch_all(pool)
    .await
}

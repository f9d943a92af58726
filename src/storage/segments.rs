//! Rough-segment aggregation — hit-weighted cross-trip merge.
//!
//! Each trip contributes per-cell roughness; the UPSERT folds it into the
//! running hit-weighted mean, adds window and trip counts, keeps the
//! newest timestamp, and refreshes the segment confidence:
//! `min(1, 0.5·trips/3 + 0.5·rough_windows/50)`.

use sqlx::{Postgres, Transaction};

use crate::types::RoughSegment;

/// Merge one trip's segments into the global table inside the caller's
/// transaction.
pub async fn upsert_segments(
    tx: &mut Transaction<'_, Postgres>,
    segments: &[RoughSegment],
) -> Result<(), sqlx::Error> {
    for s in segments {
        sqlx::query(
            r#"INSERT INTO road_quality_segments
               (segment_id, latitude, longitude, roughness, rough_windows, trips, last_ts, confidence)
               VALUES ($1, $2, $3, $4, $5, 1, $6,
                       LEAST(1.0, 0.5 * 1 / 3.0 + 0.5 * $5 / 50.0))
               ON CONFLICT (segment_id) DO UPDATE
               SET roughness =
                       (road_quality_segments.roughness * road_quality_segments.rough_windows
                        + EXCLUDED.roughness * EXCLUDED.rough_windows)
                       / NULLIF(road_quality_segments.rough_windows + EXCLUDED.rough_windows, 0),
                   rough_windows = road_quality_segments.rough_windows + EXCLUDED.rough_windows,
                   trips         = road_quality_segments.trips + 1,
                   last_ts       = GREATEST(road_quality_segments.last_ts, EXCLUDED.last_ts),
                   confidence    = LEAST(1.0,
                       0.5 * (road_quality_segments.trips + 1) / 3.0
                       + 0.5 * (road_quality_segments.rough_windows + EXCLUDED.rough_windows) / 50.0)"#,
        )
        .bind(&s.segment_id)
        .bind(s.lat)
        .bind(s.lon)
        .bind(s.roughness)
        .bind(s.rough_windows)
        .bind(s.last_ts)
        .execute(&mut **tx)
        .await?;
    }

    Ok(())
}

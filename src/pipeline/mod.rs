//! Per-trip processing pipeline.
//!
//! ```text
//! STAGE 1: Normalization   — raw payload → time-ordered sample table
//! STAGE 2: Gravity split   — adaptive smoother → residual acceleration
//! STAGE 3: Stability       — 1 s windows → mount state + stability score
//! STAGE 4: Impulses        — robust z spikes → detections
//! STAGE 5: Micro-clusters  — 10 m grid summaries for write-side dedup
//! STAGE 6: Roughness       — 40 m RMS segments over stable windows
//! ```
//!
//! The whole pipeline is pure CPU: given the same payload and clock it
//! produces bitwise-identical outputs, which is what makes reprocessing a
//! trip idempotent. Degenerate payloads (no samples, no accelerometer, no
//! parseable timestamps) are not errors — they produce empty outputs.

pub mod gravity;
pub mod impulse;
pub mod microcluster;
pub mod normalize;
pub mod roughness;
pub mod stability;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::types::{TripOutputs, TripPayload};

/// Run the full per-trip pipeline.
///
/// `ingest_time` doubles as the anchor for the synthetic timestamp grid,
/// so callers that need determinism inject a fixed clock.
pub fn process_trip(payload: &TripPayload, ingest_time: DateTime<Utc>) -> TripOutputs {
    let rows = normalize::normalize(payload, ingest_time);
    if rows.is_empty() {
        debug!(trip_id = %payload.trip_id, "degenerate trip, nothing to process");
        return TripOutputs::default();
    }

    let gaps = gravity::sample_gaps(&rows);
    let grav = gravity::estimate_gravity(&rows, &gaps);
    let linear = gravity::linear_accel(&rows, &grav);
    let lin_mag: Vec<f64> = linear.iter().map(|v| gravity::magnitude(*v)).collect();

    let classes = stability::classify(&rows, &grav, &linear);

    let z = impulse::robust_z(&lin_mag);
    let detections = impulse::detect_from_z(&rows, &z, &classes);
    let cells = microcluster::group_detections(&detections);
    let segments = roughness::segment(&rows, &z, &classes);

    debug!(
        trip_id = %payload.trip_id,
        rows = rows.len(),
        detections = detections.len(),
        cells = cells.len(),
        segments = segments.len(),
        "trip pipeline complete"
    );

    TripOutputs {
        detections,
        cells,
        segments,
    }
}

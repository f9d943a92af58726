//! Core domain types shared across the pipeline, aggregation, and API layers.
//!
//! Raw uploads arrive as [`TripPayload`] and are materialized by the
//! normalizer into [`SampleRow`]s — the single point where optional fields
//! become explicit `Option`/NaN markers. Everything downstream works on the
//! normalized table.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ============================================================================
// Upload payload
// ============================================================================

/// One raw sensor sample as uploaded by the phone app.
///
/// Every field is optional; a present `accel`/`gyro` is expected to be a
/// 3-vector but malformed vectors are tolerated (they become NaN markers
/// during normalization).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawSample {
    pub timestamp: Option<String>,
    pub uptime_ms: Option<i64>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub accuracy_m: Option<f64>,
    pub speed_mps: Option<f64>,
    pub accel: Option<Vec<f64>>,
    pub gyro: Option<Vec<f64>>,
}

/// A complete trip upload: metadata plus the ordered sample list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TripPayload {
    pub user_id: String,
    pub trip_id: String,
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub sample_count: Option<i64>,
    #[serde(default)]
    pub samples: Vec<RawSample>,
}

// ============================================================================
// Normalized sample table
// ============================================================================

/// One row of the normalized, time-ordered sample table.
///
/// `lat`/`lon`/`speed` keep `None` when the phone had no fix; missing or
/// malformed `accel`/`gyro` vectors become NaN components so the gravity
/// estimator can carry the previous state across the gap.
#[derive(Debug, Clone)]
pub struct SampleRow {
    pub ts: DateTime<Utc>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub speed: Option<f64>,
    pub accel: [f64; 3],
    pub gyro: [f64; 3],
}

impl SampleRow {
    /// Whether this row carries a usable geographic fix.
    pub fn has_fix(&self) -> bool {
        matches!((self.lat, self.lon), (Some(lat), Some(lon))
            if crate::geo::valid_coords(lat, lon))
    }
}

// ============================================================================
// Mount state & stability
// ============================================================================

/// Qualitative phone-placement label derived from the stability score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MountState {
    Mounted,
    Loose,
    Handheld,
    Unknown,
}

impl MountState {
    /// Map a stability score to a placement label.
    ///
    /// Score in [0, 1], 0 = rock solid. Non-finite scores mean the window
    /// could not be classified at all.
    pub fn from_score(score: f64) -> Self {
        if !score.is_finite() {
            Self::Unknown
        } else if score < 0.25 {
            Self::Mounted
        } else if score < 0.65 {
            Self::Loose
        } else {
            Self::Handheld
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mounted => "mounted",
            Self::Loose => "loose",
            Self::Handheld => "handheld",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for MountState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-1-second-window classification, broadcast to every sample in the
/// window.
#[derive(Debug, Clone, Copy)]
pub struct WindowClass {
    pub stability: f64,
    pub mount: MountState,
}

impl Default for WindowClass {
    fn default() -> Self {
        Self {
            stability: 0.0,
            mount: MountState::Mounted,
        }
    }
}

// ============================================================================
// Pipeline outputs
// ============================================================================

/// A single suspected impact event.
///
/// `lat`/`lon` stay `None` when the source sample had no fix; such
/// detections are kept for in-trip audit but never feed spatial
/// aggregation.
#[derive(Debug, Clone, Serialize)]
pub struct Detection {
    pub ts: DateTime<Utc>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    /// Robust z-score of vertical residual acceleration at the peak.
    pub intensity: f64,
    pub stability: f64,
    pub mount_state: MountState,
}

/// Trip-local grid-cell summary of detections, used by writers to dedupe
/// dense bursts before they hit storage.
#[derive(Debug, Clone, Serialize)]
pub struct TripCell {
    /// 40-hex digest of the `"lat_cell:lon_cell"` key.
    pub cell_id: String,
    pub lat: f64,
    pub lon: f64,
    pub hits: u64,
    pub avg_intensity: f64,
    pub avg_stability: f64,
    pub last_ts: DateTime<Utc>,
    pub mount_counts: BTreeMap<String, u64>,
}

/// Aggregated rough-road segment emitted per trip.
#[derive(Debug, Clone, Serialize)]
pub struct RoughSegment {
    /// 40-hex digest of the spatial cell key.
    pub segment_id: String,
    pub lat: f64,
    pub lon: f64,
    /// RMS of the residual-acceleration z-score over the cell.
    pub roughness: f64,
    pub rough_windows: i64,
    pub last_ts: DateTime<Utc>,
}

/// Everything the per-trip pipeline produces for one payload.
#[derive(Debug, Clone, Default)]
pub struct TripOutputs {
    pub detections: Vec<Detection>,
    pub cells: Vec<TripCell>,
    pub segments: Vec<RoughSegment>,
}

// ============================================================================
// Cross-trip aggregation
// ============================================================================

/// Cluster likelihood label derived from confidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Likelihood {
    VeryLikely,
    Likely,
    Uncertain,
}

impl Likelihood {
    pub fn from_confidence(confidence: f64) -> Self {
        if confidence >= 0.66 {
            Self::VeryLikely
        } else if confidence >= 0.40 {
            Self::Likely
        } else {
            Self::Uncertain
        }
    }
}

/// One geolocated detection as fed into cross-trip clustering.
#[derive(Debug, Clone)]
pub struct DetectionPoint {
    pub trip_id: String,
    pub user_id: String,
    pub ts: DateTime<Utc>,
    pub lat: f64,
    pub lon: f64,
    pub intensity: f64,
    pub stability: f64,
}

/// A cross-trip pothole cluster with its evidence model.
#[derive(Debug, Clone, Serialize)]
pub struct PotholeCluster {
    pub cluster_id: String,
    pub lat: f64,
    pub lon: f64,
    pub hits: u64,
    pub users: u64,
    pub last_ts: DateTime<Utc>,
    pub avg_intensity: f64,
    pub avg_stability: f64,
    /// Evidence-weight proxy, currently equal to `hits`.
    pub exposure: f64,
    pub confidence: f64,
    pub priority: f64,
    pub likelihood: Likelihood,
}

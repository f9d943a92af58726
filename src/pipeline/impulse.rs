//! Impulse detection — robust z-score spike finder over the residual
//! acceleration magnitude.
//!
//! The baseline is a rolling median with a MAD-derived scale, so a single
//! hard impact cannot drag its own threshold up. Candidates must be local
//! maxima above a stability-adjusted threshold and pass the speed gate;
//! each candidate is refined to the strongest nearby sample and the result
//! is debounced with a gap that widens when the phone is unstable.

use crate::stats::{rolling_mad_scaled, rolling_median, EPS};
use crate::types::{Detection, SampleRow, WindowClass};

/// Base z-score threshold for a very stable phone.
pub const BASE_Z_THRESHOLD: f64 = 3.5;

/// Base refractory gap between accepted detections, seconds.
pub const BASE_DEBOUNCE_S: f64 = 1.0;

/// Minimum GPS speed for the gate, m/s (~10.8 km/h).
pub const MIN_SPEED_MPS: f64 = 3.0;

/// Half-width of the peak refinement search, samples.
pub const PEAK_SEARCH_RADIUS: usize = 5;

/// Rolling baseline window and minimum occupancy, samples.
const BASELINE_WINDOW: usize = 10;
const BASELINE_MIN_PERIODS: usize = 5;

/// Robust z-score of the residual magnitude against its rolling baseline.
///
/// Non-finite scores collapse to 0 so a flat or degenerate baseline can
/// never fire.
pub fn robust_z(lin_mag: &[f64]) -> Vec<f64> {
    let baseline = rolling_median(lin_mag, BASELINE_WINDOW, BASELINE_MIN_PERIODS);
    let scale = rolling_mad_scaled(lin_mag, BASELINE_WINDOW, BASELINE_MIN_PERIODS);

    lin_mag
        .iter()
        .zip(baseline.iter().zip(&scale))
        .map(|(&mag, (&med, &sc))| {
            let z = (mag - med) / sc.max(EPS);
            if z.is_finite() {
                z
            } else {
                0.0
            }
        })
        .collect()
}

/// Whether `z[i]` is a local maximum; array edges behave as −∞ neighbors.
fn is_local_max(z: &[f64], i: usize) -> bool {
    let prev = if i == 0 { f64::NEG_INFINITY } else { z[i - 1] };
    let next = if i + 1 == z.len() {
        f64::NEG_INFINITY
    } else {
        z[i + 1]
    };
    z[i] > prev && z[i] >= next
}

/// Index of the strongest z within ±[`PEAK_SEARCH_RADIUS`] of `i`,
/// preferring the earliest on ties.
fn refine_peak(z: &[f64], i: usize) -> usize {
    let start = i.saturating_sub(PEAK_SEARCH_RADIUS);
    let end = (i + PEAK_SEARCH_RADIUS).min(z.len() - 1);
    let mut best = start;
    for j in start..=end {
        if z[j] > z[best] {
            best = j;
        }
    }
    best
}

/// Run candidate selection, peak refinement, and debounce over a
/// precomputed z-score series.
pub fn detect_from_z(rows: &[SampleRow], z: &[f64], classes: &[WindowClass]) -> Vec<Detection> {
    // The speed gate only applies when the trip carries any GPS speed:
    // a trace without speed data should not be silenced wholesale.
    let has_speed = rows.iter().any(|r| r.speed.is_some());

    let mut detections: Vec<Detection> = Vec::new();
    let mut last_accepted: Option<(usize, f64)> = None; // (row index, stability)

    for i in 0..rows.len() {
        if !is_local_max(z, i) {
            continue;
        }
        let stability = finite_or_zero(classes[i].stability);
        if z[i] <= BASE_Z_THRESHOLD + stability {
            continue;
        }
        if has_speed && rows[i].speed.unwrap_or(0.0) < MIN_SPEED_MPS {
            continue;
        }

        let peak = refine_peak(z, i);
        let peak_stability = finite_or_zero(classes[peak].stability);

        if let Some((last_idx, last_stability)) = last_accepted {
            let gap_s = (rows[peak].ts - rows[last_idx].ts)
                .num_microseconds()
                .map_or(0.0, |us| us as f64 / 1e6);
            let min_gap = BASE_DEBOUNCE_S * (1.0 + peak_stability.max(last_stability));
            if gap_s < min_gap {
                continue;
            }
        }

        detections.push(Detection {
            ts: rows[peak].ts,
            lat: rows[peak].lat,
            lon: rows[peak].lon,
            intensity: z[peak].abs(),
            stability: peak_stability,
            mount_state: classes[peak].mount,
        });
        last_accepted = Some((peak, peak_stability));
    }

    detections
}

fn finite_or_zero(v: f64) -> f64 {
    if v.is_finite() {
        v
    } else {
        0.0
    }
}

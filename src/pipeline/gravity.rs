//! Gravity separation — single-pass adaptive exponential smoother over the
//! raw accelerometer stream.
//!
//! The smoothing constant adapts to the actual inter-sample gap so the
//! estimator behaves the same at 50 Hz and 100 Hz and survives jittery
//! sampling:
//!
//! ```text
//! α_i = Δt_i / (τ + Δt_i)
//! g_i = α_i · a_i + (1 − α_i) · g_{i−1}
//! ```
//!
//! Linear (motion) acceleration is the residual `a_i − g_i`.

use crate::stats::nan_median;
use crate::types::SampleRow;

/// Gravity smoother time constant, seconds.
pub const GRAVITY_TAU_S: f64 = 0.5;

/// Fallback inter-sample gap when the trip has no usable gaps (~100 Hz).
const FALLBACK_GAP_S: f64 = 0.01;

/// Per-sample gaps in seconds.
///
/// Non-finite or non-positive gaps (including the first sample's) are
/// replaced by the median positive gap, or [`FALLBACK_GAP_S`] when the trip
/// has none.
pub fn sample_gaps(rows: &[SampleRow]) -> Vec<f64> {
    let raw: Vec<f64> = rows
        .iter()
        .enumerate()
        .map(|(i, r)| {
            if i == 0 {
                f64::NAN
            } else {
                (r.ts - rows[i - 1].ts).num_microseconds().map_or(f64::NAN, |us| us as f64 / 1e6)
            }
        })
        .collect();

    let positive: Vec<f64> = raw.iter().copied().filter(|dt| dt.is_finite() && *dt > 0.0).collect();
    let median_gap = {
        let m = nan_median(&positive);
        if m.is_finite() && m > 0.0 {
            m
        } else {
            FALLBACK_GAP_S
        }
    };

    raw.iter()
        .map(|dt| if dt.is_finite() && *dt > 0.0 { *dt } else { median_gap })
        .collect()
}

/// Estimate the per-sample gravity vector.
///
/// Rows whose accelerometer triple contains NaN inherit the previous
/// estimate; leading NaN rows get a zero vector.
pub fn estimate_gravity(rows: &[SampleRow], gaps: &[f64]) -> Vec<[f64; 3]> {
    let mut gravity = vec![[0.0; 3]; rows.len()];
    let mut prev: Option<[f64; 3]> = None;

    for (i, row) in rows.iter().enumerate() {
        let a = row.accel;
        if a.iter().any(|v| v.is_nan()) {
            gravity[i] = prev.unwrap_or([0.0; 3]);
            continue;
        }
        let g = match prev {
            None => a,
            Some(p) => {
                let alpha = gaps[i] / (GRAVITY_TAU_S + gaps[i]);
                [
                    alpha * a[0] + (1.0 - alpha) * p[0],
                    alpha * a[1] + (1.0 - alpha) * p[1],
                    alpha * a[2] + (1.0 - alpha) * p[2],
                ]
            }
        };
        gravity[i] = g;
        prev = Some(g);
    }

    gravity
}

/// Residual (gravity-removed) acceleration per sample.
pub fn linear_accel(rows: &[SampleRow], gravity: &[[f64; 3]]) -> Vec<[f64; 3]> {
    rows.iter()
        .zip(gravity)
        .map(|(r, g)| [r.accel[0] - g[0], r.accel[1] - g[1], r.accel[2] - g[2]])
        .collect()
}

/// Euclidean norm of a 3-vector.
pub fn magnitude(v: [f64; 3]) -> f64 {
    (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt()
}

//! Phone-mount stability classifier.
//!
//! Works on 1-second floor windows of the trip. Two window metrics:
//!
//! - **jitter** — spread of the angle between each sample's unit gravity
//!   vector and the window's mean gravity direction. Captures low-frequency
//!   orientation wobble (loose placement).
//! - **HF energy** — RMS of the high-passed residual acceleration magnitude.
//!   Captures hand shake and other high-frequency handling.
//!
//! Each metric is normalized by a robust scale (`1e-3 + MAD` across windows,
//! falling back to the standard deviation, then `1e-3`) and combined as a
//! soft-AND: both must be low for a window to count as stable.

use std::collections::BTreeMap;

use crate::pipeline::gravity::magnitude;
use crate::stats::{centered_rolling_mean, nan_mad, nan_rms, nan_std};
use crate::types::{MountState, SampleRow, WindowClass};

/// High-pass window (samples) for the shake metric.
const HF_WINDOW: usize = 10;

/// Metric-to-score squash rate.
const SQUASH_RATE: f64 = 0.6;

fn unit(v: [f64; 3]) -> Option<[f64; 3]> {
    let norm = magnitude(v);
    if !norm.is_finite() || norm == 0.0 || v.iter().any(|c| c.is_nan()) {
        return None;
    }
    Some([v[0] / norm, v[1] / norm, v[2] / norm])
}

/// Orientation jitter for one window of unit gravity vectors.
fn window_jitter(units: &[[f64; 3]]) -> f64 {
    if units.is_empty() {
        return 0.0;
    }
    let mut mean = [0.0f64; 3];
    for u in units {
        mean[0] += u[0];
        mean[1] += u[1];
        mean[2] += u[2];
    }
    let n = units.len() as f64;
    mean = [mean[0] / n, mean[1] / n, mean[2] / n];
    let Some(mean_dir) = unit(mean) else {
        return 0.0;
    };

    let angles: Vec<f64> = units
        .iter()
        .map(|u| {
            let dot = (u[0] * mean_dir[0] + u[1] * mean_dir[1] + u[2] * mean_dir[2])
                .clamp(-1.0, 1.0);
            dot.acos()
        })
        .collect();
    if angles.len() > 1 {
        let std = nan_std(&angles);
        if std.is_finite() {
            std
        } else {
            0.0
        }
    } else {
        0.0
    }
}

/// Robust normalization scale: `MAD`, falling back to the standard
/// deviation, then to `1e-3`.
fn robust_scale(values: &[f64]) -> f64 {
    let mad = nan_mad(values);
    if mad.is_finite() && mad > 0.0 {
        return mad;
    }
    let std = nan_std(values);
    if std.is_finite() {
        std.max(1e-3)
    } else {
        1e-3
    }
}

/// Classify every sample's window and broadcast the result per row.
pub fn classify(
    rows: &[SampleRow],
    gravity: &[[f64; 3]],
    linear: &[[f64; 3]],
) -> Vec<WindowClass> {
    if rows.is_empty() {
        return Vec::new();
    }

    // High-pass the residual per axis, then take the magnitude.
    let ax: Vec<f64> = linear.iter().map(|v| v[0]).collect();
    let ay: Vec<f64> = linear.iter().map(|v| v[1]).collect();
    let az: Vec<f64> = linear.iter().map(|v| v[2]).collect();
    let (mx, my, mz) = (
        centered_rolling_mean(&ax, HF_WINDOW),
        centered_rolling_mean(&ay, HF_WINDOW),
        centered_rolling_mean(&az, HF_WINDOW),
    );
    let hf_mag: Vec<f64> = (0..rows.len())
        .map(|i| magnitude([ax[i] - mx[i], ay[i] - my[i], az[i] - mz[i]]))
        .collect();

    // Group row indexes into 1-second floor windows.
    let mut windows: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
    for (i, row) in rows.iter().enumerate() {
        windows.entry(row.ts.timestamp()).or_default().push(i);
    }

    let mut jitters = Vec::with_capacity(windows.len());
    let mut energies = Vec::with_capacity(windows.len());
    for idxs in windows.values() {
        let units: Vec<[f64; 3]> = idxs.iter().filter_map(|&i| unit(gravity[i])).collect();
        jitters.push(window_jitter(&units));

        let hf: Vec<f64> = idxs.iter().map(|&i| hf_mag[i]).collect();
        energies.push(nan_rms(&hf));
    }

    let jitter_scale = robust_scale(&jitters);
    let energy_scale = robust_scale(&energies);

    let mut per_window: BTreeMap<i64, WindowClass> = BTreeMap::new();
    for ((&win, _), (jitter, energy)) in windows.iter().zip(jitters.iter().zip(&energies)) {
        let j_norm = jitter / (1e-3 + jitter_scale);
        let e_norm = energy / (1e-3 + energy_scale);
        let stability = (1.0 - (-SQUASH_RATE * j_norm).exp() * (-SQUASH_RATE * e_norm).exp())
            .clamp(0.0, 1.0);
        per_window.insert(
            win,
            WindowClass {
                stability,
                mount: MountState::from_score(stability),
            },
        );
    }

    rows.iter()
        .map(|r| {
            per_window
                .get(&r.ts.timestamp())
                .copied()
                .unwrap_or_default()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn rows_at_50hz(n: usize) -> Vec<SampleRow> {
        let t0 = Utc.with_ymd_and_hms(2026, 7, 1, 10, 0, 0).single().expect("ts");
        (0..n)
            .map(|i| SampleRow {
                ts: t0 + Duration::milliseconds(i as i64 * 20),
                lat: None,
                lon: None,
                speed: None,
                accel: [0.0, 0.0, 9.8],
                gyro: [0.0; 3],
            })
            .collect()
    }

    #[test]
    fn rigid_mount_scores_zero() {
        let rows = rows_at_50hz(200);
        let gravity = vec![[0.0, 0.0, 9.8]; 200];
        let linear = vec![[0.0; 3]; 200];
        let classes = classify(&rows, &gravity, &linear);
        assert!(classes.iter().all(|c| c.stability.abs() < 1e-9));
        assert!(classes.iter().all(|c| c.mount == MountState::Mounted));
    }

    #[test]
    fn uniform_wobble_reads_as_handheld() {
        let n = 400;
        let rows = rows_at_50hz(n);
        // gravity direction precesses a few degrees every sample
        let gravity: Vec<[f64; 3]> = (0..n)
            .map(|i| {
                let theta = 0.08 * (i as f64 * 1.3).sin();
                [9.8 * theta.sin(), 0.0, 9.8 * theta.cos()]
            })
            .collect();
        let linear: Vec<[f64; 3]> = (0..n)
            .map(|i| {
                let shake = 0.8 * (i as f64 * 2.1).sin();
                [shake, -shake, shake * 0.5]
            })
            .collect();
        let classes = classify(&rows, &gravity, &linear);
        let avg: f64 =
            classes.iter().map(|c| c.stability).sum::<f64>() / classes.len() as f64;
        assert!(avg > 0.65, "average stability {avg} should read handheld");
    }

    #[test]
    fn stability_is_constant_within_a_window() {
        let n = 100; // two 1-second windows at 50 Hz
        let rows = rows_at_50hz(n);
        let gravity = vec![[0.0, 0.0, 9.8]; n];
        let mut linear = vec![[0.0; 3]; n];
        linear[75] = [0.0, 0.0, 12.0]; // one burst in the second window
        let classes = classify(&rows, &gravity, &linear);
        let first = &classes[..50];
        let second = &classes[50..];
        assert!(first.windows(2).all(|w| w[0].stability == w[1].stability));
        assert!(second.windows(2).all(|w| w[0].stability == w[1].stability));
    }
}

//! Robust, NaN-skipping statistics used throughout the pipeline.
//!
//! Conventions are pinned so outputs are reproducible across platforms:
//! every aggregate skips non-finite values, quantiles interpolate linearly,
//! the MAD-to-sigma factor is 1.4826, and scale denominators are guarded by
//! `EPS = 1e-6`.

use statrs::statistics::Statistics;

/// Gaussian consistency factor: MAD × 1.4826 ≈ σ for normal data.
pub const MAD_SCALE: f64 = 1.4826;

/// Zero-guard for scale denominators.
pub const EPS: f64 = 1e-6;

fn finite(values: &[f64]) -> Vec<f64> {
    values.iter().copied().filter(|v| v.is_finite()).collect()
}

/// Mean over finite values; NaN when none are finite.
pub fn nan_mean(values: &[f64]) -> f64 {
    let kept = finite(values);
    if kept.is_empty() {
        f64::NAN
    } else {
        kept.iter().mean()
    }
}

/// Population standard deviation over finite values; NaN when none are
/// finite.
pub fn nan_std(values: &[f64]) -> f64 {
    let kept = finite(values);
    if kept.is_empty() {
        f64::NAN
    } else {
        kept.iter().population_std_dev()
    }
}

/// Root-mean-square over finite values; 0 when none are finite.
pub fn nan_rms(values: &[f64]) -> f64 {
    let kept = finite(values);
    if kept.is_empty() {
        0.0
    } else {
        kept.iter().quadratic_mean()
    }
}

/// Median over finite values; NaN when none are finite.
pub fn nan_median(values: &[f64]) -> f64 {
    let mut kept = finite(values);
    if kept.is_empty() {
        return f64::NAN;
    }
    kept.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let n = kept.len();
    if n % 2 == 1 {
        kept[n / 2]
    } else {
        (kept[n / 2 - 1] + kept[n / 2]) / 2.0
    }
}

/// Raw median absolute deviation (unscaled) over finite values.
pub fn nan_mad(values: &[f64]) -> f64 {
    let med = nan_median(values);
    if !med.is_finite() {
        return f64::NAN;
    }
    let deviations: Vec<f64> = values
        .iter()
        .filter(|v| v.is_finite())
        .map(|v| (v - med).abs())
        .collect();
    nan_median(&deviations)
}

/// Linear-interpolation quantile over finite values, `q` in [0, 1].
///
/// With a single value that value is returned; with none, NaN.
pub fn quantile(values: &[f64], q: f64) -> f64 {
    let mut kept = finite(values);
    if kept.is_empty() {
        return f64::NAN;
    }
    kept.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    if kept.len() == 1 {
        return kept[0];
    }
    let k = (kept.len() - 1) as f64 * q.clamp(0.0, 1.0);
    let f = k.floor() as usize;
    let c = k.ceil() as usize;
    if f == c {
        kept[f]
    } else {
        kept[f] * (c as f64 - k) + kept[c] * (k - f as f64)
    }
}

/// Rolling median over a trailing window.
///
/// Positions with fewer than `min_periods` finite values in the window
/// yield NaN.
pub fn rolling_median(values: &[f64], window: usize, min_periods: usize) -> Vec<f64> {
    rolling_apply(values, window, min_periods, nan_median)
}

/// Rolling MAD over a trailing window, scaled by [`MAD_SCALE`] to σ-like
/// units.
pub fn rolling_mad_scaled(values: &[f64], window: usize, min_periods: usize) -> Vec<f64> {
    rolling_apply(values, window, min_periods, |w| nan_mad(w) * MAD_SCALE)
}

fn rolling_apply<F>(values: &[f64], window: usize, min_periods: usize, f: F) -> Vec<f64>
where
    F: Fn(&[f64]) -> f64,
{
    let mut out = Vec::with_capacity(values.len());
    for i in 0..values.len() {
        let start = (i + 1).saturating_sub(window);
        let slice = &values[start..=i];
        let finite_count = slice.iter().filter(|v| v.is_finite()).count();
        if finite_count < min_periods {
            out.push(f64::NAN);
        } else {
            out.push(f(slice));
        }
    }
    out
}

/// Centered rolling mean with a minimum of one finite value per window.
///
/// An even `window` spans `window / 2` values before and `window / 2 - 1`
/// after the current position.
pub fn centered_rolling_mean(values: &[f64], window: usize) -> Vec<f64> {
    let half_before = window / 2;
    let half_after = window.saturating_sub(half_before + 1);
    let mut out = Vec::with_capacity(values.len());
    for i in 0..values.len() {
        let start = i.saturating_sub(half_before);
        let end = (i + half_after).min(values.len().saturating_sub(1));
        out.push(nan_mean(&values[start..=end]));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn median_skips_nan() {
        assert_relative_eq!(nan_median(&[1.0, f64::NAN, 3.0]), 2.0);
        assert!(nan_median(&[f64::NAN]).is_nan());
    }

    #[test]
    fn mad_of_constant_is_zero() {
        assert_relative_eq!(nan_mad(&[5.0, 5.0, 5.0]), 0.0);
    }

    #[test]
    fn quantile_interpolates_linearly() {
        let values: Vec<f64> = (0..10).map(|i| 0.10 + i as f64 * (0.85 / 9.0)).collect();
        // k = 9 * 0.75 = 6.75 → v6 + 0.75 * (v7 - v6)
        let expected = values[6] + 0.75 * (values[7] - values[6]);
        assert_relative_eq!(quantile(&values, 0.75), expected, epsilon = 1e-12);
    }

    #[test]
    fn quantile_of_single_value() {
        assert_relative_eq!(quantile(&[0.42], 0.75), 0.42);
    }

    #[test]
    fn rolling_median_respects_min_periods() {
        let xs = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let med = rolling_median(&xs, 3, 3);
        assert!(med[0].is_nan());
        assert!(med[1].is_nan());
        assert_relative_eq!(med[2], 2.0);
        assert_relative_eq!(med[5], 5.0);
    }

    #[test]
    fn centered_mean_tracks_local_level() {
        let xs = vec![0.0; 20];
        let hp = centered_rolling_mean(&xs, 10);
        assert!(hp.iter().all(|v| v.abs() < 1e-12));
    }

    #[test]
    fn rms_ignores_non_finite() {
        assert_relative_eq!(nan_rms(&[3.0, f64::INFINITY, 4.0]), (12.5f64).sqrt());
        assert_relative_eq!(nan_rms(&[]), 0.0);
    }
}

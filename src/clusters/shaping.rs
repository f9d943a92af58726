//! Query shaping — confidence thresholding for API consumers.
//!
//! Plain queries get the floor they asked for. Dashboard queries with no
//! explicit floor get an adaptive one: the 75th percentile of the current
//! confidence distribution, so the map always shows the standout quarter
//! instead of a fixed cut that goes stale as the fleet grows.

use crate::stats::quantile;
use crate::types::PotholeCluster;

/// Dashboard auto-threshold quantile.
pub const DASHBOARD_QUANTILE: f64 = 0.75;

/// Resolve the effective confidence threshold.
pub fn threshold(confidences: &[f64], min_conf: f64, dashboard: bool) -> f64 {
    if !dashboard {
        return min_conf.max(0.0);
    }
    if min_conf > 0.0 {
        return min_conf;
    }
    let q = quantile(confidences, DASHBOARD_QUANTILE);
    if q.is_finite() {
        q
    } else {
        0.0
    }
}

/// Apply the threshold and limit to an already-sorted cluster list.
///
/// A non-positive `limit` means unlimited.
pub fn shape(
    clusters: Vec<PotholeCluster>,
    min_conf: f64,
    dashboard: bool,
    limit: i64,
) -> Vec<PotholeCluster> {
    let confidences: Vec<f64> = clusters.iter().map(|c| c.confidence).collect();
    let theta = threshold(&confidences, min_conf, dashboard);

    let mut shaped: Vec<PotholeCluster> = clusters
        .into_iter()
        .filter(|c| c.confidence >= theta)
        .collect();
    if limit > 0 {
        shaped.truncate(limit as usize);
    }
    shaped
}

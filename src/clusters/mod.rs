//! Cross-trip aggregation — on-demand clustering of the detections
//! snapshot into scored pothole clusters.
//!
//! ## Modules
//!
//! - `dbscan` — haversine density clustering
//! - `confidence` — evidence model (confidence, priority, likelihood)
//! - `shaping` — confidence thresholding for API consumers
//!
//! Clusters are never persisted; every query re-runs the aggregation
//! against whatever detections snapshot it reads, so cluster output can lag
//! an in-flight trip write without ever being internally inconsistent.

pub mod confidence;
pub mod dbscan;
pub mod shaping;

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use sha1::{Digest, Sha1};

use crate::stats::nan_mean;
use crate::types::{DetectionPoint, PotholeCluster};

/// Centroid-derived cluster id: `pc_` + first 10 hex chars of
/// SHA-1 of the centroid rounded to 4 decimals (~11 m).
///
/// Centroids within GPS drift of each other intentionally collide, so the
/// same defect keeps the same id across recomputations.
pub fn cluster_id(lat: f64, lon: f64) -> String {
    let key = format!("{}:{}", round4(lat), round4(lon));
    let mut hasher = Sha1::new();
    hasher.update(key.as_bytes());
    let digest = hex::encode(hasher.finalize());
    format!("pc_{}", &digest[..10])
}

fn round4(v: f64) -> f64 {
    (v * 10_000.0).round() / 10_000.0
}

/// Cluster the detections snapshot and score every cluster.
///
/// `total_trips` of zero means the system has no evidence base at all and
/// yields an empty list. Output is sorted by descending priority, then
/// descending confidence.
pub fn build_clusters(
    points: &[DetectionPoint],
    total_trips: i64,
    eps_m: f64,
    now: DateTime<Utc>,
) -> Vec<PotholeCluster> {
    if total_trips == 0 || points.is_empty() {
        return Vec::new();
    }

    let eps = dbscan::clamp_eps_m(eps_m);
    let coords: Vec<(f64, f64)> = points.iter().map(|p| (p.lat, p.lon)).collect();
    let labels = dbscan::cluster_labels(&coords, eps);

    let mut members: BTreeMap<usize, Vec<&DetectionPoint>> = BTreeMap::new();
    for (point, &label) in points.iter().zip(&labels) {
        members.entry(label).or_default().push(point);
    }

    let mut clusters: Vec<PotholeCluster> = members
        .into_values()
        .map(|pts| {
            let lats: Vec<f64> = pts.iter().map(|p| p.lat).collect();
            let lons: Vec<f64> = pts.iter().map(|p| p.lon).collect();
            let intensities: Vec<f64> = pts.iter().map(|p| p.intensity).collect();
            let stabilities: Vec<f64> = pts.iter().map(|p| p.stability).collect();

            let lat = nan_mean(&lats);
            let lon = nan_mean(&lons);
            let hits = pts.len() as u64;
            let users = pts
                .iter()
                .map(|p| p.user_id.as_str())
                .collect::<HashSet<_>>()
                .len() as u64;
            let last_ts = pts
                .iter()
                .map(|p| p.ts)
                .max()
                .unwrap_or(DateTime::<Utc>::MIN_UTC);
            let avg_intensity = nan_mean(&intensities);
            let avg_stability = nan_mean(&stabilities);

            let scored = confidence::score(
                hits,
                users,
                total_trips,
                avg_intensity,
                avg_stability,
                last_ts,
                now,
            );

            PotholeCluster {
                cluster_id: cluster_id(lat, lon),
                lat,
                lon,
                hits,
                users,
                last_ts,
                avg_intensity,
                avg_stability,
                exposure: hits as f64,
                confidence: scored.confidence,
                priority: scored.priority,
                likelihood: scored.likelihood,
            }
        })
        .collect();

    clusters.sort_by(|a, b| {
        b.priority
            .partial_cmp(&a.priority)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(
                b.confidence
                    .partial_cmp(&a.confidence)
                    .unwrap_or(std::cmp::Ordering::Equal),
            )
    });
    clusters
}

//! Cluster evidence model — confidence, priority, likelihood.
//!
//! Confidence blends four terms and then decays with staleness:
//!
//! - coverage: what fraction of all trips saw this defect
//! - hits: saturating count of raw detections
//! - intensity: logistic squash of the mean impact z-score
//! - stability: quality discount for shaky evidence
//!
//! The blend is monotone nondecreasing in coverage, hit count, and
//! intensity at fixed recency, and strictly nonincreasing in age.

use chrono::{DateTime, Utc};
use statrs::function::logistic::logistic;

use crate::types::Likelihood;

/// Term weights.
const W_COVERAGE: f64 = 0.45;
const W_HITS: f64 = 0.25;
const W_INTENSITY: f64 = 0.20;
const W_STABILITY: f64 = 0.10;

/// Hit-count saturation constant.
const HITS_SCALE: f64 = 3.0;

/// Intensity logistic midpoint / slope.
const INTENSITY_MID: f64 = 4.0;
const INTENSITY_SLOPE: f64 = 2.0;

/// Recency half-scale, days.
const RECENCY_DAYS: f64 = 60.0;

/// Priority blend and intensity cap.
const PRIORITY_CONFIDENCE_W: f64 = 0.7;
const PRIORITY_SEVERITY_W: f64 = 0.3;
const INTENSITY_CAP: f64 = 10.0;

/// Scored evidence for one cluster.
#[derive(Debug, Clone, Copy)]
pub struct ClusterScore {
    pub confidence: f64,
    pub priority: f64,
    pub likelihood: Likelihood,
}

/// Score one cluster against the global trip count and the query clock.
pub fn score(
    hits: u64,
    users: u64,
    total_trips: i64,
    avg_intensity: f64,
    avg_stability: f64,
    last_ts: DateTime<Utc>,
    now: DateTime<Utc>,
) -> ClusterScore {
    let coverage = (users as f64 / total_trips.max(1) as f64).clamp(0.0, 1.0);
    let hits_term = 1.0 - (-(hits as f64) / HITS_SCALE).exp();
    let intensity_term = logistic((avg_intensity - INTENSITY_MID) / INTENSITY_SLOPE);
    let stability_q = 1.0 - avg_stability.clamp(0.0, 1.0);

    let raw = W_COVERAGE * coverage
        + W_HITS * hits_term
        + W_INTENSITY * intensity_term
        + W_STABILITY * stability_q;

    let age_days = ((now - last_ts).num_milliseconds() as f64 / 86_400_000.0).max(0.0);
    let recency = (-age_days / RECENCY_DAYS).exp();

    let confidence = (raw * recency).clamp(0.0, 1.0);

    let norm_intensity = (avg_intensity / INTENSITY_CAP).min(1.0);
    let priority = (PRIORITY_CONFIDENCE_W * confidence
        + PRIORITY_SEVERITY_W * norm_intensity * (1.0 - avg_stability))
        .clamp(0.0, 1.0);

    ClusterScore {
        confidence,
        priority,
        likelihood: Likelihood::from_confidence(confidence),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn now() -> DateTime<Utc> {
        "2026-07-01T12:00:00Z".parse().expect("clock")
    }

    #[test]
    fn full_coverage_recent_cluster_is_very_likely() {
        let t = now();
        let s = score(3, 3, 3, 6.0, 0.1, t - Duration::days(1), t);
        assert!(s.confidence >= 0.7, "confidence {}", s.confidence);
        assert_eq!(s.likelihood, Likelihood::VeryLikely);
    }

    #[test]
    fn confidence_monotone_in_hits() {
        let t = now();
        let last = t - Duration::days(2);
        let mut prev = 0.0;
        for hits in 1..30u64 {
            let s = score(hits, 2, 10, 5.0, 0.2, last, t);
            assert!(
                s.confidence >= prev,
                "hits {hits}: {} < {prev}",
                s.confidence
            );
            prev = s.confidence;
        }
    }

    #[test]
    fn confidence_decays_with_age() {
        let t = now();
        let fresh = score(5, 3, 10, 6.0, 0.2, t - Duration::days(1), t);
        let stale = score(5, 3, 10, 6.0, 0.2, t - Duration::days(120), t);
        assert!(stale.confidence < fresh.confidence);
    }

    #[test]
    fn future_timestamps_do_not_boost() {
        let t = now();
        let future = score(5, 3, 10, 6.0, 0.2, t + Duration::days(3), t);
        let current = score(5, 3, 10, 6.0, 0.2, t, t);
        assert!((future.confidence - current.confidence).abs() < 1e-12);
    }

    #[test]
    fn shaky_evidence_scores_lower() {
        let t = now();
        let last = t - Duration::days(1);
        let solid = score(5, 3, 10, 6.0, 0.0, last, t);
        let shaky = score(5, 3, 10, 6.0, 0.9, last, t);
        assert!(shaky.confidence < solid.confidence);
        assert!(shaky.priority < solid.priority);
    }
}

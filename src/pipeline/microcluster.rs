//! Trip-local micro-clustering of detections onto a ~10 m grid.
//!
//! A burst of detections over one defect collapses into a single cell
//! summary, letting writers dedupe before anything reaches storage. The
//! authoritative cross-trip clustering happens later, against the full
//! detections table.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::geo::{cell_digest, cell_edge_deg, cell_key, grid_cell};
use crate::stats::nan_mean;
use crate::types::{Detection, TripCell};

/// Micro-cluster grid edge, meters.
pub const CELL_EDGE_M: f64 = 10.0;

/// Group geolocated detections into grid-cell summaries.
///
/// Detections without a fix are skipped; they cannot participate in any
/// spatial view.
pub fn group_detections(detections: &[Detection]) -> Vec<TripCell> {
    let edge = cell_edge_deg(CELL_EDGE_M);

    let mut by_cell: BTreeMap<(i64, i64), Vec<&Detection>> = BTreeMap::new();
    for d in detections {
        if let (Some(lat), Some(lon)) = (d.lat, d.lon) {
            if crate::geo::valid_coords(lat, lon) {
                by_cell.entry(grid_cell(lat, lon, edge)).or_default().push(d);
            }
        }
    }

    by_cell
        .into_iter()
        .map(|(cell, members)| {
            let lats: Vec<f64> = members.iter().filter_map(|d| d.lat).collect();
            let lons: Vec<f64> = members.iter().filter_map(|d| d.lon).collect();
            let intensities: Vec<f64> = members.iter().map(|d| d.intensity).collect();
            let stabilities: Vec<f64> = members.iter().map(|d| d.stability).collect();

            let mut mount_counts: BTreeMap<String, u64> = BTreeMap::new();
            for d in &members {
                *mount_counts.entry(d.mount_state.to_string()).or_default() += 1;
            }

            let last_ts = members
                .iter()
                .map(|d| d.ts)
                .max()
                .unwrap_or(DateTime::<Utc>::MIN_UTC);

            TripCell {
                cell_id: cell_digest(&cell_key(cell)),
                lat: nan_mean(&lats),
                lon: nan_mean(&lons),
                hits: members.len() as u64,
                avg_intensity: nan_mean(&intensities),
                avg_stability: nan_mean(&stabilities),
                last_ts,
                mount_counts,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MountState;
    use chrono::{Duration, TimeZone, Utc};

    fn detection(lat: f64, lon: f64, intensity: f64, sec: i64) -> Detection {
        let t0 = Utc.with_ymd_and_hms(2026, 7, 1, 10, 0, 0).single().expect("ts");
        Detection {
            ts: t0 + Duration::seconds(sec),
            lat: Some(lat),
            lon: Some(lon),
            intensity,
            stability: 0.1,
            mount_state: MountState::Mounted,
        }
    }

    #[test]
    fn dense_burst_collapses_into_one_cell() {
        let hits = vec![
            detection(33.888_60, 35.495_50, 5.0, 0),
            detection(33.888_61, 35.495_51, 7.0, 2),
            detection(33.888_62, 35.495_50, 6.0, 4),
        ];
        let cells = group_detections(&hits);
        assert_eq!(cells.len(), 1);
        assert_eq!(cells[0].hits, 3);
        assert!((cells[0].avg_intensity - 6.0).abs() < 1e-9);
        assert_eq!(cells[0].last_ts, hits[2].ts);
        assert_eq!(cells[0].mount_counts.get("mounted"), Some(&3));
        assert_eq!(cells[0].cell_id.len(), 40);
    }

    #[test]
    fn distant_detections_get_separate_cells() {
        let hits = vec![
            detection(33.8886, 35.4955, 5.0, 0),
            detection(33.8986, 35.4955, 5.0, 10), // ~1.1 km north
        ];
        assert_eq!(group_detections(&hits).len(), 2);
    }

    #[test]
    fn detections_without_fix_are_skipped() {
        let mut d = detection(33.8886, 35.4955, 5.0, 0);
        d.lat = None;
        assert!(group_detections(&[d]).is_empty());
    }
}

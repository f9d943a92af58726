//! Rough-road segmentation — RMS of the residual z-score over stable,
//! geolocated stretches of a trip, binned onto a ~40 m grid.
//!
//! Only windows the stability classifier trusts contribute: a handheld
//! phone shaking in a cup holder should not mark a road as rough.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::geo::{cell_digest, cell_edge_deg, cell_key, grid_cell};
use crate::stats::{nan_mean, nan_rms};
use crate::types::{RoughSegment, SampleRow, WindowClass};

/// Roughness grid edge, meters.
pub const CELL_EDGE_M: f64 = 40.0;

/// Maximum stability for a sample to count toward roughness.
pub const MAX_STABILITY: f64 = 0.4;

/// Minimum samples per cell before a segment is emitted.
pub const MIN_CELL_SAMPLES: usize = 10;

/// Build rough-road segments from the per-sample table and z-score series.
pub fn segment(rows: &[SampleRow], z: &[f64], classes: &[WindowClass]) -> Vec<RoughSegment> {
    let edge = cell_edge_deg(CELL_EDGE_M);

    let mut by_cell: BTreeMap<(i64, i64), Vec<usize>> = BTreeMap::new();
    for (i, row) in rows.iter().enumerate() {
        if !row.has_fix() || classes[i].stability > MAX_STABILITY {
            continue;
        }
        if let (Some(lat), Some(lon)) = (row.lat, row.lon) {
            by_cell.entry(grid_cell(lat, lon, edge)).or_default().push(i);
        }
    }

    by_cell
        .into_iter()
        .filter(|(_, idxs)| idxs.len() >= MIN_CELL_SAMPLES)
        .map(|(cell, idxs)| {
            let lats: Vec<f64> = idxs.iter().filter_map(|&i| rows[i].lat).collect();
            let lons: Vec<f64> = idxs.iter().filter_map(|&i| rows[i].lon).collect();
            let zs: Vec<f64> = idxs.iter().map(|&i| z[i]).collect();
            let last_ts = idxs
                .iter()
                .map(|&i| rows[i].ts)
                .max()
                .unwrap_or(DateTime::<Utc>::MIN_UTC);

            RoughSegment {
                segment_id: cell_digest(&cell_key(cell)),
                lat: nan_mean(&lats),
                lon: nan_mean(&lons),
                roughness: nan_rms(&zs),
                rough_windows: idxs.len() as i64,
                last_ts,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MountState;
    use chrono::{Duration, TimeZone, Utc};

    fn row(lat: f64, lon: f64, ms: i64) -> SampleRow {
        let t0 = Utc.with_ymd_and_hms(2026, 7, 1, 10, 0, 0).single().expect("ts");
        SampleRow {
            ts: t0 + Duration::milliseconds(ms),
            lat: Some(lat),
            lon: Some(lon),
            speed: Some(10.0),
            accel: [0.0, 0.0, 9.8],
            gyro: [0.0; 3],
        }
    }

    fn stable(n: usize) -> Vec<WindowClass> {
        vec![
            WindowClass {
                stability: 0.1,
                mount: MountState::Mounted,
            };
            n
        ]
    }

    #[test]
    fn emits_segment_for_a_populated_cell() {
        let rows: Vec<SampleRow> = (0..20).map(|i| row(33.8886, 35.4955, i * 20)).collect();
        let z = vec![2.0; 20];
        let segments = segment(&rows, &z, &stable(20));
        assert_eq!(segments.len(), 1);
        assert!((segments[0].roughness - 2.0).abs() < 1e-9);
        assert_eq!(segments[0].rough_windows, 20);
        assert_eq!(segments[0].segment_id.len(), 40);
    }

    #[test]
    fn sparse_cells_are_dropped() {
        let rows: Vec<SampleRow> = (0..5).map(|i| row(33.8886, 35.4955, i * 20)).collect();
        let z = vec![2.0; 5];
        assert!(segment(&rows, &z, &stable(5)).is_empty());
    }

    #[test]
    fn unstable_windows_do_not_contribute() {
        let rows: Vec<SampleRow> = (0..20).map(|i| row(33.8886, 35.4955, i * 20)).collect();
        let z = vec![2.0; 20];
        let shaky = vec![
            WindowClass {
                stability: 0.8,
                mount: MountState::Handheld,
            };
            20
        ];
        assert!(segment(&rows, &z, &shaky).is_empty());
    }

    #[test]
    fn rows_without_fix_are_excluded() {
        let mut rows: Vec<SampleRow> = (0..20).map(|i| row(33.8886, 35.4955, i * 20)).collect();
        for r in rows.iter_mut().take(15) {
            r.lat = None;
        }
        let z = vec![2.0; 20];
        // only 5 geolocated rows remain — below the cell minimum
        assert!(segment(&rows, &z, &stable(20)).is_empty());
    }

    #[test]
    fn nan_z_values_are_skipped_in_rms() {
        let rows: Vec<SampleRow> = (0..12).map(|i| row(33.8886, 35.4955, i * 20)).collect();
        let mut z = vec![3.0; 12];
        z[0] = f64::NAN;
        let segments = segment(&rows, &z, &stable(12));
        assert_eq!(segments.len(), 1);
        assert!((segments[0].roughness - 3.0).abs() < 1e-9);
    }
}

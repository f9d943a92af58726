//! Geographic helpers: haversine distance, coordinate validation, and the
//! square grid cells used for trip-local deduplication and roughness
//! binning.

/// Mean Earth radius in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Degrees of latitude per meter at city scale (1° ≈ 111 111 m).
const DEG_PER_METER: f64 = 1.0 / 111_111.0;

/// Great-circle distance between two WGS84 points, in meters.
pub fn haversine_m(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).max(0.0).sqrt());
    EARTH_RADIUS_M * c
}

/// Whether a lat/lon pair is finite and inside [-90, 90] × [-180, 180].
pub fn valid_coords(lat: f64, lon: f64) -> bool {
    lat.is_finite() && lon.is_finite() && (-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lon)
}

/// Grid edge length in degrees for a square cell of roughly `meters` on a
/// side.
pub fn cell_edge_deg(meters: f64) -> f64 {
    meters * DEG_PER_METER
}

/// Snap a coordinate pair onto the integer grid of the given edge length.
pub fn grid_cell(lat: f64, lon: f64, edge_deg: f64) -> (i64, i64) {
    ((lat / edge_deg).round() as i64, (lon / edge_deg).round() as i64)
}

/// Stable textual key for a grid cell, input to the cell digest.
pub fn cell_key(cell: (i64, i64)) -> String {
    format!("{}:{}", cell.0, cell.1)
}

/// 40-hex SHA-1 digest of a cell key, used as the stable cell/segment id.
pub fn cell_digest(key: &str) -> String {
    use sha1::{Digest, Sha1};
    let mut hasher = Sha1::new();
    hasher.update(key.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn haversine_zero_for_identical_points() {
        assert_relative_eq!(haversine_m(33.8886, 35.4955, 33.8886, 35.4955), 0.0);
    }

    #[test]
    fn haversine_one_degree_latitude() {
        let d = haversine_m(33.0, 35.0, 34.0, 35.0);
        // one degree of latitude ≈ 111.2 km
        assert!((d - 111_194.0).abs() < 200.0, "got {d}");
    }

    #[test]
    fn coordinate_validation() {
        assert!(valid_coords(33.9, 35.5));
        assert!(!valid_coords(91.0, 0.0));
        assert!(!valid_coords(0.0, -181.0));
        assert!(!valid_coords(f64::NAN, 35.5));
    }

    #[test]
    fn nearby_points_share_a_cell() {
        let edge = cell_edge_deg(10.0);
        // ~2 m apart, well inside one 10 m cell
        let a = grid_cell(33.888_60, 35.495_50, edge);
        let b = grid_cell(33.888_61, 35.495_51, edge);
        assert_eq!(a, b);
    }

    #[test]
    fn cell_digest_is_stable_40_hex() {
        let d = cell_digest("376543:394450");
        assert_eq!(d.len(), 40);
        assert_eq!(d, cell_digest("376543:394450"));
        assert_ne!(d, cell_digest("376543:394451"));
    }

    #[test]
    fn distant_points_differ() {
        let edge = cell_edge_deg(10.0);
        let a = grid_cell(33.8886, 35.4955, edge);
        let b = grid_cell(33.8896, 35.4955, edge);
        assert_ne!(a, b);
    }
}

//! Sample normalization — raw upload rows into the uniform, time-ordered
//! sample table.
//!
//! Timestamps come from the first usable source, chosen once per trip:
//! per-sample ISO-8601 strings, then `start_time + uptime_ms`, then a
//! synthetic 20 Hz grid anchored at ingest time. Rows that fail the chosen
//! source are dropped. This is the single point where absent fields become
//! explicit markers: `lat`/`lon`/`speed` stay `None`, absent or malformed
//! `accel`/`gyro` vectors become NaN triples.

use chrono::{DateTime, Duration, NaiveDateTime, Utc};

use crate::types::{RawSample, SampleRow, TripPayload};

/// Synthetic fallback grid rate when no time source exists at all.
const SYNTHETIC_HZ: i64 = 20;

/// Parse an upload timestamp string to UTC.
///
/// Accepts RFC 3339 with offset plus the common naive variants phones emit;
/// naive times are taken as UTC.
pub fn parse_ts(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(naive.and_utc());
        }
    }
    None
}

fn vec3(raw: Option<&Vec<f64>>) -> [f64; 3] {
    match raw {
        Some(v) if v.len() == 3 => [v[0], v[1], v[2]],
        _ => [f64::NAN; 3],
    }
}

enum TsSource {
    Timestamp,
    Uptime(DateTime<Utc>),
    Synthetic(DateTime<Utc>),
}

fn choose_ts_source(payload: &TripPayload, ingest_time: DateTime<Utc>) -> TsSource {
    let any_parseable = payload
        .samples
        .iter()
        .filter_map(|s| s.timestamp.as_deref())
        .any(|raw| parse_ts(raw).is_some());
    if any_parseable {
        return TsSource::Timestamp;
    }
    if let Some(start) = payload.start_time {
        if payload.samples.iter().any(|s| s.uptime_ms.is_some()) {
            return TsSource::Uptime(start);
        }
    }
    TsSource::Synthetic(ingest_time)
}

fn row_ts(sample: &RawSample, index: usize, source: &TsSource) -> Option<DateTime<Utc>> {
    match source {
        TsSource::Timestamp => sample.timestamp.as_deref().and_then(parse_ts),
        TsSource::Uptime(start) => sample
            .uptime_ms
            .map(|ms| *start + Duration::milliseconds(ms)),
        TsSource::Synthetic(anchor) => {
            Some(*anchor + Duration::milliseconds(index as i64 * 1000 / SYNTHETIC_HZ))
        }
    }
}

/// Materialize the normalized sample table for one trip.
///
/// Returns rows sorted ascending by timestamp; ties keep upload order.
/// An empty result means the trip is degenerate and every downstream stage
/// yields empty outputs.
pub fn normalize(payload: &TripPayload, ingest_time: DateTime<Utc>) -> Vec<SampleRow> {
    if payload.samples.is_empty() {
        return Vec::new();
    }
    // A trip with no accelerometer data at all cannot produce anything.
    if payload.samples.iter().all(|s| s.accel.is_none()) {
        return Vec::new();
    }

    let source = choose_ts_source(payload, ingest_time);

    let mut rows: Vec<SampleRow> = payload
        .samples
        .iter()
        .enumerate()
        .filter_map(|(i, s)| {
            let ts = row_ts(s, i, &source)?;
            // an out-of-range or half-present fix is no fix at all
            let (lat, lon) = match (s.latitude, s.longitude) {
                (Some(lat), Some(lon)) if crate::geo::valid_coords(lat, lon) => {
                    (Some(lat), Some(lon))
                }
                _ => (None, None),
            };
            Some(SampleRow {
                ts,
                lat,
                lon,
                speed: s.speed_mps.filter(|v| v.is_finite()),
                accel: vec3(s.accel.as_ref()),
                gyro: vec3(s.gyro.as_ref()),
            })
        })
        .collect();

    // Stable sort: equal timestamps keep upload order.
    rows.sort_by_key(|r| r.ts);
    rows
}

//! GeoJSON export tool — pulls clusters and raw detections from a running
//! Roadwatch API and writes FeatureCollections for geojson.io / QGIS.
//!
//! ## Usage
//!
//! ```bash
//! cargo run --bin export-geojson -- --backend-url http://localhost:8000
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use serde_json::{json, Value};
use std::path::PathBuf;
use tracing::info;

use roadwatch::stats::quantile;

/// Confidence quantile separating dashboard-worthy clusters from the rest.
const DASHBOARD_QUANTILE: f64 = 0.6;

#[derive(Parser, Debug)]
#[command(name = "export-geojson", about = "Export Roadwatch data as GeoJSON")]
struct CliArgs {
    /// Base URL of the Roadwatch API
    #[arg(long, default_value = "http://localhost:8000")]
    backend_url: String,

    /// Output directory
    #[arg(long, default_value = ".")]
    out_dir: PathBuf,

    /// API key forwarded as X-API-Key (if the backend requires one)
    #[arg(long, env = "API_KEY")]
    api_key: Option<String>,
}

async fn fetch_json(
    client: &reqwest::Client,
    url: &str,
    query: &[(&str, String)],
) -> Result<Vec<Value>> {
    let response = client
        .get(url)
        .query(query)
        .send()
        .await
        .with_context(|| format!("GET {url}"))?
        .error_for_status()?;
    Ok(response.json().await?)
}

fn point_feature(lat: f64, lon: f64, properties: Value) -> Value {
    json!({
        "type": "Feature",
        "geometry": { "type": "Point", "coordinates": [lon, lat] },
        "properties": properties,
    })
}

fn clusters_to_geojson(clusters: &[Value]) -> Value {
    let features: Vec<Value> = clusters
        .iter()
        .filter_map(|c| {
            let lat = c.get("lat").and_then(Value::as_f64)?;
            let lon = c.get("lon").and_then(Value::as_f64)?;
            let props = json!({
                "cluster_id": c.get("cluster_id"),
                "confidence": c.get("confidence"),
                "priority": c.get("priority"),
                "likelihood": c.get("likelihood"),
                "hits": c.get("hits"),
                "users": c.get("users"),
                "avg_intensity": c.get("avg_intensity"),
                "avg_stability": c.get("avg_stability"),
                "exposure": c.get("exposure"),
                "last_ts": c.get("last_ts"),
            });
            Some(point_feature(lat, lon, props))
        })
        .collect();
    json!({ "type": "FeatureCollection", "features": features })
}

fn detections_to_geojson(detections: &[Value]) -> Value {
    let features: Vec<Value> = detections
        .iter()
        .filter_map(|d| {
            let lat = d.get("latitude").and_then(Value::as_f64)?;
            let lon = d.get("longitude").and_then(Value::as_f64)?;
            let props = json!({
                "trip_id": d.get("trip_id"),
                "ts": d.get("ts"),
                "intensity": d.get("intensity"),
                "stability": d.get("stability"),
                "mount_state": d.get("mount_state"),
            });
            Some(point_feature(lat, lon, props))
        })
        .collect();
    json!({ "type": "FeatureCollection", "features": features })
}

/// Pick the dashboard subset: non-uncertain clusters at or above the
/// confidence quantile.
fn dashboard_subset(clusters: &[Value]) -> Vec<Value> {
    let candidates: Vec<&Value> = clusters
        .iter()
        .filter(|c| c.get("likelihood").and_then(Value::as_str) != Some("uncertain"))
        .collect();
    if candidates.is_empty() {
        return Vec::new();
    }

    let confidences: Vec<f64> = candidates
        .iter()
        .filter_map(|c| c.get("confidence").and_then(Value::as_f64))
        .collect();
    let threshold = quantile(&confidences, DASHBOARD_QUANTILE);

    candidates
        .into_iter()
        .filter(|c| {
            c.get("confidence")
                .and_then(Value::as_f64)
                .is_some_and(|conf| conf >= threshold)
        })
        .cloned()
        .collect()
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = CliArgs::parse();

    let mut headers = reqwest::header::HeaderMap::new();
    if let Some(key) = &args.api_key {
        headers.insert("x-api-key", key.parse().context("invalid API key header")?);
    }
    let client = reqwest::Client::builder().default_headers(headers).build()?;

    info!(backend = %args.backend_url, "Fetching raw detections");
    let detections = fetch_json(
        &client,
        &format!("{}/api/v1/detections", args.backend_url),
        &[("min_intensity", "0".into()), ("limit", "20000".into())],
    )
    .await?;
    info!(count = detections.len(), "Got detections");

    info!("Fetching all clusters (no confidence cut)");
    let clusters = fetch_json(
        &client,
        &format!("{}/api/v1/clusters", args.backend_url),
        &[("min_conf", "0".into()), ("limit", "5000".into())],
    )
    .await?;
    info!(count = clusters.len(), "Got clusters");

    let dashboard = dashboard_subset(&clusters);
    info!(count = dashboard.len(), "Dashboard clusters after quantile cut");

    let outputs = [
        ("detections.geojson", detections_to_geojson(&detections)),
        ("clusters_all.geojson", clusters_to_geojson(&clusters)),
        ("clusters_dashboard.geojson", clusters_to_geojson(&dashboard)),
    ];
    for (name, doc) in outputs {
        let path = args.out_dir.join(name);
        std::fs::write(&path, serde_json::to_string_pretty(&doc)?)
            .with_context(|| format!("writing {}", path.display()))?;
        info!(path = %path.display(), "Saved");
    }

    Ok(())
}

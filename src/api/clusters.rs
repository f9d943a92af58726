//! Cluster query handlers — on-demand aggregation over the detections
//! snapshot.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::debug;

use crate::api::error::ApiError;
use crate::api::AppState;
use crate::clusters::{build_clusters, dbscan, shaping};
use crate::storage::{detections, trips};
use crate::types::PotholeCluster;

fn default_min_conf() -> f64 {
    0.4
}
fn default_limit() -> i64 {
    500
}
fn default_eps_m() -> f64 {
    dbscan::EPS_DEFAULT_M
}

#[derive(Debug, Deserialize)]
pub struct ClusterQuery {
    #[serde(default = "default_min_conf")]
    pub min_conf: f64,
    #[serde(default)]
    pub since: Option<DateTime<Utc>>,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub dashboard: bool,
    #[serde(default = "default_eps_m")]
    pub eps_m: f64,
}

async fn compute_clusters(
    state: &AppState,
    eps_m: f64,
) -> Result<(i64, Vec<PotholeCluster>), ApiError> {
    let total = trips::total_trips(&state.db).await?;
    if total == 0 {
        return Ok((0, Vec::new()));
    }
    let points = detections::fetch_geolocated(&state.db).await?;
    let clusters = build_clusters(&points, total, eps_m, Utc::now());
    Ok((total, clusters))
}

/// GET /api/v1/clusters
pub async fn get_clusters(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ClusterQuery>,
) -> Result<Json<Vec<PotholeCluster>>, ApiError> {
    let (total, mut clusters) = compute_clusters(&state, query.eps_m).await?;

    if let Some(since) = query.since {
        clusters.retain(|c| c.last_ts >= since);
    }
    let shaped = shaping::shape(clusters, query.min_conf, query.dashboard, query.limit);

    debug!(
        total_trips = total,
        clusters = shaped.len(),
        dashboard = query.dashboard,
        "cluster query served"
    );
    Ok(Json(shaped))
}

#[derive(Debug, Deserialize)]
pub struct LeaderboardQuery {
    #[serde(default = "default_leaderboard_limit")]
    pub limit: i64,
}

fn default_leaderboard_limit() -> i64 {
    50
}

/// GET /api/v1/leaderboard — top clusters by priority, no confidence cut.
pub async fn get_leaderboard(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LeaderboardQuery>,
) -> Result<Json<Vec<PotholeCluster>>, ApiError> {
    let (_, mut clusters) = compute_clusters(&state, dbscan::EPS_DEFAULT_M).await?;
    if query.limit > 0 {
        clusters.truncate(query.limit as usize);
    }
    Ok(Json(clusters))
}

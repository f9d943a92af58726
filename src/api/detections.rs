//! Raw-detection query handler.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;

use crate::api::error::ApiError;
use crate::api::AppState;
use crate::storage::detections::{self, DetectionRow};

fn default_limit() -> i64 {
    5000
}

#[derive(Debug, Deserialize)]
pub struct DetectionQuery {
    #[serde(default)]
    pub min_intensity: f64,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

/// GET /api/v1/detections — raw pre-clustering detections, newest first.
pub async fn get_detections(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DetectionQuery>,
) -> Result<Json<Vec<DetectionRow>>, ApiError> {
    let rows = detections::fetch_recent(&state.db, query.min_intensity, query.limit).await?;
    Ok(Json(rows))
}

//! Health check endpoint.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use chrono::Utc;
use serde::Serialize;

use crate::api::AppState;
use crate::storage::jobs;

#[derive(Serialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub time: String,
    pub db_connected: bool,
    pub pending_jobs: i64,
}

pub async fn get_health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let pending = jobs::pending_job_count(&state.db).await;
    let db_ok = pending.is_ok();

    Json(HealthResponse {
        ok: db_ok,
        time: Utc::now().to_rfc3339(),
        db_connected: db_ok,
        pending_jobs: pending.unwrap_or(0),
    })
}

//! Trip upload handler.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::Serialize;
use tracing::info;

use crate::api::auth::ApiKey;
use crate::api::error::ApiError;
use crate::api::AppState;
use crate::storage::{jobs, trips};
use crate::types::TripPayload;

#[derive(Serialize)]
pub struct IngestResponse {
    pub ok: bool,
}

/// Decompress the body when the client sent `Content-Encoding: zstd`.
///
/// The decompressed size is capped at the configured body limit so a tiny
/// compressed bomb cannot blow past it.
fn decompress_body(headers: &HeaderMap, body: Bytes, max_bytes: usize) -> Result<Bytes, ApiError> {
    let is_zstd = headers
        .get("content-encoding")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.contains("zstd"))
        .unwrap_or(false);

    if !is_zstd {
        return Ok(body);
    }

    let decompressed = zstd::decode_all(body.as_ref())
        .map_err(|e| ApiError::PayloadInvalid(format!("zstd decompression failed: {e}")))?;
    if decompressed.len() > max_bytes {
        return Err(ApiError::PayloadTooLarge);
    }
    Ok(Bytes::from(decompressed))
}

/// POST /api/v1/trips — accept a trip upload, persist it, and enqueue
/// background processing.
pub async fn ingest_trip(
    State(state): State<Arc<AppState>>,
    _auth: ApiKey,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<IngestResponse>, ApiError> {
    let max_bytes = state.config.max_body_bytes();

    // Reject on the advertised length first so oversized uploads fail
    // before the body is even read into memory.
    if let Some(advertised) = headers
        .get("content-length")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok())
    {
        if advertised > max_bytes {
            return Err(ApiError::PayloadTooLarge);
        }
    }
    if body.len() > max_bytes {
        return Err(ApiError::PayloadTooLarge);
    }

    let data = decompress_body(&headers, body, max_bytes)?;

    let raw: serde_json::Value = serde_json::from_slice(&data)
        .map_err(|e| ApiError::PayloadInvalid(format!("invalid JSON: {e}")))?;
    let payload: TripPayload = serde_json::from_value(raw.clone())
        .map_err(|e| ApiError::PayloadInvalid(e.to_string()))?;

    if payload.user_id.is_empty() || payload.trip_id.is_empty() {
        return Err(ApiError::PayloadInvalid(
            "user_id and trip_id must be non-empty".to_string(),
        ));
    }

    // All three rows commit together: no partial upload is ever visible.
    let mut tx = state.db.begin().await?;
    trips::store_upload(&mut tx, &payload, &raw).await?;
    tx.commit().await?;

    let job_id = jobs::enqueue_trip(&state.db, &payload.trip_id)
        .await
        .map_err(ApiError::Internal)?;

    info!(
        trip_id = %payload.trip_id,
        user_id = %payload.user_id,
        samples = payload.samples.len(),
        job_id = %job_id,
        "Trip ingested"
    );

    Ok(Json(IngestResponse { ok: true }))
}

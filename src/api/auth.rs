//! Shared-secret authentication extractor for the upload endpoint.

use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::api::error::ApiError;
use crate::api::AppState;

/// Proof that the request carried a valid `X-API-Key` header.
///
/// When the configured key is empty, authentication is disabled entirely
/// (local development) and every request passes.
pub struct ApiKey;

#[async_trait]
impl FromRequestParts<Arc<AppState>> for ApiKey {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        if state.config.api_key.is_empty() {
            return Ok(Self);
        }

        let provided = parts
            .headers
            .get("x-api-key")
            .and_then(|v| v.to_str().ok())
            .ok_or(ApiError::AuthRejected)?;

        if provided == state.config.api_key {
            Ok(Self)
        } else {
            Err(ApiError::AuthRejected)
        }
    }
}

//! HTTP API — trip ingestion and cluster/detection queries.
//!
//! ## Routes
//!
//! - `POST /api/v1/trips` — authenticated trip upload, enqueues processing
//! - `GET /api/v1/clusters` — on-demand cross-trip clustering
//! - `GET /api/v1/detections` — raw detections, newest first
//! - `GET /api/v1/leaderboard` — top clusters by priority
//! - `GET /api/v1/health` — liveness + DB reachability
//!
//! Rate limiting is IP-based via `GovernorLayer` and returns HTTP 429 on
//! burst exhaustion automatically.

pub mod auth;
pub mod clusters;
pub mod detections;
pub mod error;
pub mod health;
pub mod trips;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::Router;
use sqlx::PgPool;
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::AppConfig;

/// Shared application state.
pub struct AppState {
    /// Database connection pool
    pub db: PgPool,
    /// Service configuration
    pub config: AppConfig,
}

impl AppState {
    pub fn new(db: PgPool, config: AppConfig) -> Arc<Self> {
        Arc::new(Self { db, config })
    }
}

/// Build the complete API router.
pub fn build_router(state: Arc<AppState>) -> Router {
    let max_body = state.config.max_body_bytes();

    let api_routes = Router::new()
        .route("/trips", axum::routing::post(trips::ingest_trip))
        .route("/clusters", axum::routing::get(clusters::get_clusters))
        .route("/detections", axum::routing::get(detections::get_detections))
        .route("/leaderboard", axum::routing::get(clusters::get_leaderboard))
        .route("/health", axum::routing::get(health::get_health));

    // Rate limiting: 10 req/s sustained, burst up to 60 per IP
    let governor_config = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(10)
            .burst_size(60)
            .finish()
            .expect("valid governor config"),
    );

    Router::new()
        .nest("/api/v1", api_routes)
        .layer(DefaultBodyLimit::max(max_body))
        .layer(GovernorLayer {
            config: governor_config,
        })
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

//! PostgreSQL storage layer.
//!
//! ## Modules
//!
//! - `trips` — users / trips / raw payload upserts and snapshot reads
//! - `detections` — transactional per-trip detection writes and queries
//! - `segments` — hit-weighted rough-segment aggregation
//! - `jobs` — trip-processing job queue (`SELECT … FOR UPDATE SKIP LOCKED`)

pub mod detections;
pub mod jobs;
pub mod segments;
pub mod trips;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;
use tracing::info;

/// Create the bounded PostgreSQL connection pool.
pub async fn create_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url)
        .await?;

    info!("Connected to PostgreSQL");
    Ok(pool)
}

/// Run database migrations from the migrations/ directory.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    info!("Running database migrations...");
    sqlx::migrate!("./migrations").run(pool).await?;
    info!("Migrations complete");
    Ok(())
}

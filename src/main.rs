//! Roadwatch API server.
//!
//! ## Usage
//!
//! ```bash
//! DATABASE_URL=postgres://localhost/roadwatch API_KEY=secret \
//! cargo run --bin roadwatch-api
//! ```
//!
//! ## Environment variables
//!
//! | Variable        | Required | Description                               |
//! |-----------------|----------|-------------------------------------------|
//! | `DATABASE_URL`  | Yes      | PostgreSQL connection string              |
//! | `API_KEY`       | No       | Upload shared secret; empty disables auth |
//! | `MAX_BODY_MB`   | No       | Upload size cap (default: 40)             |
//! | `BROKER_URL`    | No       | Job-queue DSN (default: `DATABASE_URL`)   |

use clap::Parser;
use std::net::SocketAddr;
use tracing::info;

use roadwatch::api;
use roadwatch::config::AppConfig;
use roadwatch::storage;

#[derive(Parser, Debug)]
#[command(name = "roadwatch-api", about = "Roadwatch — road defect mapping API server")]
struct CliArgs {
    /// PostgreSQL connection URL
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Port to listen on (default: 8000)
    #[arg(long, short)]
    port: Option<u16>,

    /// Bind address (overrides --port)
    #[arg(long)]
    bind_address: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,roadwatch=debug")),
        )
        .init();

    let args = CliArgs::parse();

    let config = AppConfig::from_env(args.database_url, args.bind_address, args.port)?;
    if config.database_url.is_empty() {
        anyhow::bail!("DATABASE_URL must be set via --database-url or DATABASE_URL env var");
    }

    info!(bind = %config.bind_address, "Starting Roadwatch API");

    // ── Database ──────────────────────────────────────────────────────────────
    let pool = storage::create_pool(&config.database_url).await?;
    storage::run_migrations(&pool).await?;

    // ── HTTP server ───────────────────────────────────────────────────────────
    let state = api::AppState::new(pool, config.clone());
    let app = api::build_router(state);
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    info!(address = %config.bind_address, "Roadwatch API listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Roadwatch API shut down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    info!("Shutdown signal received");
}

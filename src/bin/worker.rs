//! Roadwatch background worker — processes queued trips.
//!
//! ## Usage
//!
//! ```bash
//! DATABASE_URL=postgres://localhost/roadwatch cargo run --bin roadwatch-worker
//! ```
//!
//! Multiple workers can run against the same queue; each claims its own
//! jobs via `SELECT … FOR UPDATE SKIP LOCKED`.

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::info;

use roadwatch::config::AppConfig;
use roadwatch::storage;
use roadwatch::worker::run_worker;

#[derive(Parser, Debug)]
#[command(name = "roadwatch-worker", about = "Roadwatch — trip processing worker")]
struct CliArgs {
    /// PostgreSQL connection URL
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Queue poll interval in seconds
    #[arg(long)]
    poll_secs: Option<u64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,roadwatch=debug")),
        )
        .init();

    let args = CliArgs::parse();

    let mut config = AppConfig::from_env(args.database_url, None, None)?;
    if let Some(poll) = args.poll_secs {
        config.worker_poll_secs = poll;
    }
    if config.database_url.is_empty() {
        anyhow::bail!("DATABASE_URL must be set via --database-url or DATABASE_URL env var");
    }

    // Workers talk to the broker DSN, which defaults to the primary.
    let pool = storage::create_pool(&config.broker_url).await?;
    storage::run_migrations(&pool).await?;

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown signal received");
            signal_cancel.cancel();
        }
    });

    run_worker(pool, config, cancel).await;

    info!("Worker shut down gracefully");
    Ok(())
}

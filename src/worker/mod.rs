//! Background trip-processing worker.
//!
//! Claims one job per iteration from the Postgres queue, loads the stored
//! raw payload, runs the pure pipeline, and commits all trip outputs in a
//! single transaction. Cancellation between claim and commit leaves no
//! partial rows — the job is simply retried later.

use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::PgPool;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::config::AppConfig;
use crate::pipeline;
use crate::storage::{detections, jobs, segments, trips};
use crate::types::TripPayload;

/// Outcome summary of one processed trip, for logging and tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessSummary {
    pub detections: u64,
    pub cells: usize,
    pub segments: usize,
}

/// Process one claimed trip end to end.
pub async fn process_trip_job(pool: &PgPool, trip_id: &str) -> Result<ProcessSummary> {
    let Some(raw) = trips::fetch_raw_payload(pool, trip_id).await? else {
        // Trip was deleted between enqueue and claim — nothing to do.
        info!(trip_id = %trip_id, "no raw payload, skipping");
        return Ok(ProcessSummary::default());
    };

    let payload: TripPayload =
        serde_json::from_value(raw).context("stored payload failed to deserialize")?;

    let outputs = pipeline::process_trip(&payload, Utc::now());

    let mut tx = pool.begin().await?;
    let written = detections::replace_for_trip(&mut tx, trip_id, &outputs.detections).await?;
    segments::upsert_segments(&mut tx, &outputs.segments).await?;
    tx.commit().await?;

    Ok(ProcessSummary {
        detections: written,
        cells: outputs.cells.len(),
        segments: outputs.segments.len(),
    })
}

/// Run the worker loop until cancelled.
pub async fn run_worker(pool: PgPool, config: AppConfig, cancel: CancellationToken) {
    let poll = Duration::from_secs(config.worker_poll_secs.max(1));
    info!(poll_secs = poll.as_secs(), "Worker started");

    loop {
        if cancel.is_cancelled() {
            info!("Worker shutting down");
            return;
        }

        let job = match jobs::claim_job(&pool).await {
            Ok(Some(job)) => job,
            Ok(None) => {
                // Queue empty — sleep unless shutdown arrives first.
                tokio::select! {
                    () = cancel.cancelled() => {
                        info!("Worker shutting down");
                        return;
                    }
                    () = tokio::time::sleep(poll) => continue,
                }
            }
            Err(e) => {
                error!(error = %e, "Failed to claim job");
                tokio::time::sleep(poll).await;
                continue;
            }
        };

        match process_trip_job(&pool, &job.trip_id).await {
            Ok(summary) => {
                info!(
                    trip_id = %job.trip_id,
                    detections = summary.detections,
                    cells = summary.cells,
                    segments = summary.segments,
                    "Trip processed"
                );
                if let Err(e) = jobs::complete_job(&pool, &job).await {
                    error!(job_id = %job.id, error = %e, "Failed to mark job done");
                }
            }
            Err(e) => {
                error!(trip_id = %job.trip_id, error = %e, "Trip processing failed");
                if let Err(e) = jobs::fail_job(&pool, &job, &e.to_string()).await {
                    error!(job_id = %job.id, error = %e, "Failed to mark job failed");
                }
            }
        }
    }
}

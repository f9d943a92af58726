//! Trip-processing job queue — PostgreSQL-backed async work queue.
//!
//! Uses `SELECT FOR UPDATE SKIP LOCKED` so multiple workers can each claim
//! their own job without stepping on each other. One job = one trip.

use anyhow::Result;
use sqlx::PgPool;
use tracing::warn;

/// A claimed trip-processing job.
#[derive(Debug, Clone)]
pub struct TripJob {
    pub id: String,
    pub trip_id: String,
    pub retry_count: i32,
    pub max_retries: i32,
}

/// Enqueue processing for a trip, returning the job id.
pub async fn enqueue_trip(pool: &PgPool, trip_id: &str) -> Result<String> {
    let id = uuid::Uuid::new_v4().to_string();

    sqlx::query("INSERT INTO trip_jobs (id, trip_id) VALUES ($1, $2)")
        .bind(&id)
        .bind(trip_id)
        .execute(pool)
        .await?;

    Ok(id)
}

/// Atomically claim the next pending job.
///
/// Returns `None` when the queue is empty.
pub async fn claim_job(pool: &PgPool) -> Result<Option<TripJob>, sqlx::Error> {
    let row: Option<(String, String, i32, i32)> = sqlx::query_as(
        r#"
        UPDATE trip_jobs
        SET    status = 'running',
               claimed_at = NOW()
        WHERE  id = (
            SELECT id
            FROM   trip_jobs
            WHERE  status = 'pending'
              AND  retry_count < max_retries
            ORDER  BY created_at ASC
            LIMIT  1
            FOR UPDATE SKIP LOCKED
        )
        RETURNING id, trip_id, retry_count, max_retries
        "#,
    )
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|(id, trip_id, retry_count, max_retries)| TripJob {
        id,
        trip_id,
        retry_count,
        max_retries,
    }))
}

/// Mark a job as successfully completed.
pub async fn complete_job(pool: &PgPool, job: &TripJob) -> Result<()> {
    sqlx::query(
        "UPDATE trip_jobs \
         SET status = 'done', completed_at = NOW() \
         WHERE id = $1",
    )
    .bind(&job.id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Mark a job as failed. Increments the retry counter; when retries are
/// exhausted the job transitions to `'failed'` permanently. The raw trip
/// payload stays in `trip_raw`, so a failed job can always be re-enqueued.
pub async fn fail_job(pool: &PgPool, job: &TripJob, error: &str) -> Result<()> {
    let next_retry = job.retry_count + 1;
    let exhausted = next_retry >= job.max_retries;

    let new_status = if exhausted { "failed" } else { "pending" };

    if exhausted {
        warn!(
            job_id = %job.id,
            trip_id = %job.trip_id,
            retries = next_retry,
            "Trip job permanently failed after {} attempts",
            next_retry
        );
    }

    sqlx::query(
        "UPDATE trip_jobs \
         SET status        = $1, \
             retry_count   = $2, \
             error_message = $3, \
             completed_at  = CASE WHEN $4 THEN NOW() ELSE NULL END, \
             claimed_at    = NULL \
         WHERE id = $5",
    )
    .bind(new_status)
    .bind(next_retry)
    .bind(error)
    .bind(exhausted)
    .bind(&job.id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Count of jobs waiting to be claimed.
pub async fn pending_job_count(pool: &PgPool) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM trip_jobs WHERE status = 'pending'")
        .fetch_one(pool)
        .await
}

//! Download job persistence
//!
//! The pipeline task owning a job is its only writer. Updates are
//! compare-and-set on the previous status, so a terminal row can never be
//! overwritten.

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use tunepipe_common::{Error, JobStatus, Result};
use uuid::Uuid;

use crate::models::{DownloadJob, EnrichmentReport};
use crate::utils::db_retry::{retry_on_lock, DEFAULT_MAX_LOCK_WAIT_MS};

/// Error recorded on jobs whose pipeline died with the previous process
pub const INTERRUPTED_ERROR: &str = "interrupted by restart";

/// Fixed-width UTC timestamp; sorts lexicographically
fn timestamp(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(value: &str, column: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("Failed to parse {}: {}", column, e)))
}

fn row_to_job(row: &SqliteRow) -> Result<DownloadJob> {
    let uuid: String = row.get("uuid");
    let uuid = Uuid::parse_str(&uuid)
        .map_err(|e| Error::Internal(format!("Invalid job uuid {}: {}", uuid, e)))?;

    let status: String = row.get("status");
    let enrichment: String = row.get("enrichment");
    let enrichment: EnrichmentReport = serde_json::from_str(&enrichment)
        .map_err(|e| Error::Internal(format!("Failed to deserialize enrichment: {}", e)))?;

    let created_at: String = row.get("created_at");
    let updated_at: String = row.get("updated_at");

    Ok(DownloadJob {
        uuid,
        track_id: row.get("track_id"),
        status: JobStatus::from_str(&status)?,
        file_path: row.get("file_path"),
        error: row.get("error"),
        enrichment,
        created_at: parse_timestamp(&created_at, "created_at")?,
        updated_at: parse_timestamp(&updated_at, "updated_at")?,
    })
}

/// Insert a new job
///
/// A duplicate identifier is a primary-key violation and fails; existing
/// rows are never replaced.
pub async fn insert_job(pool: &SqlitePool, job: &DownloadJob) -> Result<()> {
    let uuid = job.uuid.to_string();
    let enrichment = serde_json::to_string(&job.enrichment)
        .map_err(|e| Error::Internal(format!("Failed to serialize enrichment: {}", e)))?;
    let created_at = timestamp(&job.created_at);
    let updated_at = timestamp(&job.updated_at);

    retry_on_lock("insert_job", DEFAULT_MAX_LOCK_WAIT_MS, || async {
        sqlx::query(
            r#"
            INSERT INTO download_jobs (
                uuid, track_id, status, file_path, error, enrichment, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&uuid)
        .bind(&job.track_id)
        .bind(job.status.as_str())
        .bind(&job.file_path)
        .bind(&job.error)
        .bind(&enrichment)
        .bind(&created_at)
        .bind(&updated_at)
        .execute(pool)
        .await?;
        Ok::<(), Error>(())
    })
    .await
}

/// Persist `job` if the stored row is still in `expected_status`
///
/// Returns `Error::Internal` when the row is missing or has moved on.
pub async fn update_job(pool: &SqlitePool, job: &DownloadJob, expected_status: JobStatus) -> Result<()> {
    let uuid = job.uuid.to_string();
    let enrichment = serde_json::to_string(&job.enrichment)
        .map_err(|e| Error::Internal(format!("Failed to serialize enrichment: {}", e)))?;
    let updated_at = timestamp(&job.updated_at);

    let rows = retry_on_lock("update_job", DEFAULT_MAX_LOCK_WAIT_MS, || async {
        let result = sqlx::query(
            r#"
            UPDATE download_jobs
            SET status = ?, file_path = ?, error = ?, enrichment = ?, updated_at = ?
            WHERE uuid = ? AND status = ?
            "#,
        )
        .bind(job.status.as_str())
        .bind(&job.file_path)
        .bind(&job.error)
        .bind(&enrichment)
        .bind(&updated_at)
        .bind(&uuid)
        .bind(expected_status.as_str())
        .execute(pool)
        .await?;
        Ok::<u64, Error>(result.rows_affected())
    })
    .await?;

    if rows == 0 {
        return Err(Error::Internal(format!(
            "Job {} is missing or no longer {}",
            job.uuid, expected_status
        )));
    }
    Ok(())
}

/// Load a job by identifier
pub async fn load_job(pool: &SqlitePool, job_id: Uuid) -> Result<Option<DownloadJob>> {
    let row = sqlx::query(
        r#"
        SELECT uuid, track_id, status, file_path, error, enrichment, created_at, updated_at
        FROM download_jobs
        WHERE uuid = ?
        "#,
    )
    .bind(job_id.to_string())
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(row_to_job).transpose()
}

/// Fail every non-terminal job
///
/// Run once at startup, before workers start: no pipeline from an earlier
/// process survives, so those jobs can never finish.
pub async fn sweep_interrupted_jobs(pool: &SqlitePool) -> Result<u64> {
    let result = sqlx::query(
        r#"
        UPDATE download_jobs
        SET status = ?, file_path = NULL, error = ?, updated_at = ?
        WHERE status NOT IN (?, ?)
        "#,
    )
    .bind(JobStatus::Failed.as_str())
    .bind(INTERRUPTED_ERROR)
    .bind(timestamp(&Utc::now()))
    .bind(JobStatus::Completed.as_str())
    .bind(JobStatus::Failed.as_str())
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

/// Non-terminal jobs created more than `stale_after_secs` ago
pub async fn count_stale_jobs(pool: &SqlitePool, stale_after_secs: u64) -> Result<i64> {
    let age = chrono::Duration::seconds(i64::try_from(stale_after_secs).unwrap_or(i64::MAX / 1000));
    let cutoff = timestamp(&(Utc::now() - age));

    let count: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*)
        FROM download_jobs
        WHERE status NOT IN (?, ?) AND created_at < ?
        "#,
    )
    .bind(JobStatus::Completed.as_str())
    .bind(JobStatus::Failed.as_str())
    .bind(cutoff)
    .fetch_one(pool)
    .await?;

    Ok(count)
}

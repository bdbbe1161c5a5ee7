//! Job rows: the observable lifecycle of one orchestration.
//!
//! The job row is the canonical outcome channel: the orchestrator writes
//! it at every stage boundary and readers poll it. Progress writes are
//! advisory; callers log and ignore their failures.

use super::{now_iso, DbPool};
use crate::error::StorageError;

/// Lifecycle state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    /// Canonical lowercase form for persistence.
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }
}

/// A persisted job row. JSON columns are kept as raw strings here and
/// parsed by readers; a missing or malformed progress blob is tolerated.
#[derive(Debug, Clone, sqlx::FromRow, serde::Serialize)]
pub struct JobRow {
    pub id: String,
    pub status: String,
    pub created_at: String,
    pub started_at: Option<String>,
    pub completed_at: Option<String>,
    pub parameters: Option<String>,
    pub progress: Option<String>,
    pub result: Option<String>,
    pub error: Option<String>,
}

/// Create a pending job row. Returns `false` when a job with this id
/// already exists (the id doubles as an idempotency key).
pub async fn create_job(
    pool: &DbPool,
    job_id: &str,
    parameters_json: &str,
) -> Result<bool, StorageError> {
    let result = sqlx::query(
        "INSERT INTO jobs (id, status, created_at, parameters) \
         VALUES (?, 'pending', ?, ?) \
         ON CONFLICT (id) DO NOTHING",
    )
    .bind(job_id)
    .bind(now_iso())
    .bind(parameters_json)
    .execute(pool)
    .await
    .map_err(|e| StorageError::Query { source: e })?;

    Ok(result.rows_affected() > 0)
}

/// Transition a job to `running` and stamp `started_at`.
pub async fn mark_running(pool: &DbPool, job_id: &str) -> Result<(), StorageError> {
    sqlx::query("UPDATE jobs SET status = 'running', started_at = ? WHERE id = ?")
        .bind(now_iso())
        .bind(job_id)
        .execute(pool)
        .await
        .map_err(|e| StorageError::Query { source: e })?;
    Ok(())
}

/// Overwrite the advisory progress blob.
pub async fn set_progress(
    pool: &DbPool,
    job_id: &str,
    progress_json: &str,
) -> Result<(), StorageError> {
    sqlx::query("UPDATE jobs SET progress = ? WHERE id = ?")
        .bind(progress_json)
        .bind(job_id)
        .execute(pool)
        .await
        .map_err(|e| StorageError::Query { source: e })?;
    Ok(())
}

/// Terminal transition to `completed` with the result summary.
pub async fn complete_job(
    pool: &DbPool,
    job_id: &str,
    result_json: &str,
) -> Result<(), StorageError> {
    sqlx::query(
        "UPDATE jobs SET status = 'completed', completed_at = ?, result = ?, error = NULL \
         WHERE id = ?",
    )
    .bind(now_iso())
    .bind(result_json)
    .bind(job_id)
    .execute(pool)
    .await
    .map_err(|e| StorageError::Query { source: e })?;
    Ok(())
}

/// Terminal transition to `failed` with the stringified error.
pub async fn fail_job(pool: &DbPool, job_id: &str, error: &str) -> Result<(), StorageError> {
    sqlx::query(
        "UPDATE jobs SET status = 'failed', completed_at = ?, error = ?, result = NULL \
         WHERE id = ?",
    )
    .bind(now_iso())
    .bind(error)
    .bind(job_id)
    .execute(pool)
    .await
    .map_err(|e| StorageError::Query { source: e })?;
    Ok(())
}

/// Fetch a single job row.
pub async fn get_job(pool: &DbPool, job_id: &str) -> Result<Option<JobRow>, StorageError> {
    sqlx::query_as::<_, JobRow>("SELECT * FROM jobs WHERE id = ?")
        .bind(job_id)
        .fetch_optional(pool)
        .await
        .map_err(|e| StorageError::Query { source: e })
}

/// List recent jobs, newest first.
pub async fn list_jobs(pool: &DbPool, limit: u32) -> Result<Vec<JobRow>, StorageError> {
    sqlx::query_as::<_, JobRow>(
        "SELECT * FROM jobs ORDER BY created_at DESC, id DESC LIMIT ?",
    )
    .bind(limit)
    .fetch_all(pool)
    .await
    .map_err(|e| StorageError::Query { source: e })
}

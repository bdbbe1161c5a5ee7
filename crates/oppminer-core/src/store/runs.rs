//! Run rows: one header per completed idea-generation job.

use super::{now_iso, DbPool};
use crate::error::StorageError;

/// A run header grouping the ideas of one orchestration.
#[derive(Debug, Clone, sqlx::FromRow, serde::Serialize)]
pub struct Run {
    /// Store-assigned run id.
    pub id: i64,
    /// Platform filter the job ran with ("all" when unfiltered).
    pub platform: String,
    /// The job's lookback window in days.
    pub period_days: i64,
    /// The job's post-select limit.
    pub source_limit: i64,
    /// Free-form notes about the run.
    pub notes: Option<String>,
    /// ISO-8601 creation timestamp.
    pub created_at: String,
}

/// A run joined with its persisted idea count, for listings.
#[derive(Debug, Clone, sqlx::FromRow, serde::Serialize)]
pub struct RunSummary {
    pub id: i64,
    pub platform: String,
    pub period_days: i64,
    pub source_limit: i64,
    pub notes: Option<String>,
    pub created_at: String,
    pub idea_count: i64,
}

/// Create a run header and return its id.
pub async fn create_run(
    pool: &DbPool,
    platform: &str,
    period_days: u32,
    source_limit: u32,
    notes: Option<&str>,
) -> Result<i64, StorageError> {
    let result = sqlx::query(
        "INSERT INTO runs (platform, period_days, source_limit, notes, created_at) \
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(platform)
    .bind(period_days)
    .bind(source_limit)
    .bind(notes)
    .bind(now_iso())
    .execute(pool)
    .await
    .map_err(|e| StorageError::Query { source: e })?;

    Ok(result.last_insert_rowid())
}

/// List recent runs with their idea counts, newest first.
pub async fn list_runs(pool: &DbPool, limit: u32) -> Result<Vec<RunSummary>, StorageError> {
    sqlx::query_as::<_, RunSummary>(
        "SELECT r.id, r.platform, r.period_days, r.source_limit, r.notes, r.created_at, \
                COUNT(i.id) AS idea_count \
         FROM runs r \
         LEFT JOIN ideas i ON i.run_id = r.id \
         GROUP BY r.id \
         ORDER BY r.created_at DESC, r.id DESC \
         LIMIT ?",
    )
    .bind(limit)
    .fetch_all(pool)
    .await
    .map_err(|e| StorageError::Query { source: e })
}

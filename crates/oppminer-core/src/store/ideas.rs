//! Persistence for generated ideas.
//!
//! Ideas are written once per job, after deduplication and validation. The
//! typed columns carry the fields the console queries on; everything else
//! (automation signals, validation detail, the raw model object) rides in
//! the `payload` JSON blob for forensic replay.

use super::{now_iso, DbPool};
use crate::error::StorageError;
use crate::idea::Idea;

/// A persisted idea row.
#[derive(Debug, Clone, sqlx::FromRow, serde::Serialize)]
pub struct IdeaRow {
    pub id: i64,
    pub run_id: i64,
    pub name: String,
    pub name_norm: String,
    pub score: i64,
    pub one_liner: String,
    pub target_user: String,
    pub core_features: String,
    pub why_now: String,
    pub pricing_hint: String,
    pub rationale: String,
    pub representative_post_ids: String,
    pub posts_in_common: i64,
    pub confidence_level: String,
    pub pattern_evidence: String,
    pub payload: String,
    pub created_at: String,
}

/// Insert a batch of ideas for one run. Returns the number actually
/// inserted; on a `(run_id, name_norm)` conflict the existing row wins.
pub async fn insert_ideas(
    pool: &DbPool,
    run_id: i64,
    ideas: &[Idea],
) -> Result<u64, StorageError> {
    let mut inserted = 0u64;
    let created_at = now_iso();

    for idea in ideas {
        let core_features = serde_json::to_string(&idea.core_features).unwrap_or_default();
        let post_ids = serde_json::to_string(&idea.representative_post_ids).unwrap_or_default();
        let payload = serde_json::to_string(idea).unwrap_or_default();

        let result = sqlx::query(
            "INSERT INTO ideas (run_id, name, name_norm, score, one_liner, target_user, \
                                core_features, why_now, pricing_hint, rationale, \
                                representative_post_ids, posts_in_common, confidence_level, \
                                pattern_evidence, payload, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT (run_id, name_norm) DO NOTHING",
        )
        .bind(run_id)
        .bind(&idea.name)
        .bind(&idea.name_norm)
        .bind(idea.persisted_score())
        .bind(&idea.one_liner)
        .bind(&idea.target_user)
        .bind(core_features)
        .bind(&idea.why_now)
        .bind(&idea.pricing_hint)
        .bind(&idea.rationale)
        .bind(post_ids)
        .bind(idea.cluster_size as i64)
        .bind(idea.confidence_level())
        .bind(&idea.pattern_evidence)
        .bind(payload)
        .bind(&created_at)
        .execute(pool)
        .await
        .map_err(|e| StorageError::Query { source: e })?;

        inserted += result.rows_affected();
    }

    Ok(inserted)
}

/// Recent `(name, target_user)` pairs for deduplication against prior runs.
pub async fn recent_idea_names(
    pool: &DbPool,
    lookback_days: u32,
    limit: u32,
) -> Result<Vec<(String, String)>, StorageError> {
    sqlx::query_as::<_, (String, String)>(
        "SELECT name, target_user FROM ideas \
         WHERE created_at >= strftime('%Y-%m-%dT%H:%M:%SZ', 'now', '-' || ?1 || ' days') \
         ORDER BY created_at DESC \
         LIMIT ?2",
    )
    .bind(lookback_days)
    .bind(limit)
    .fetch_all(pool)
    .await
    .map_err(|e| StorageError::Query { source: e })
}

/// Persisted ideas of one run, highest score first.
pub async fn ideas_for_run(pool: &DbPool, run_id: i64) -> Result<Vec<IdeaRow>, StorageError> {
    sqlx::query_as::<_, IdeaRow>(
        "SELECT * FROM ideas WHERE run_id = ? ORDER BY score DESC, id ASC",
    )
    .bind(run_id)
    .fetch_all(pool)
    .await
    .map_err(|e| StorageError::Query { source: e })
}

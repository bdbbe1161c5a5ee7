//! Run and idea listing endpoints.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use serde_json::{json, Value};

use oppminer_core::store::{ideas, runs};

use crate::error::ApiError;
use crate::routes::jobs::ListQuery;
use crate::state::AppState;

/// `GET /runs`: recent runs with idea counts.
pub async fn list_runs(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Value>, ApiError> {
    let rows = runs::list_runs(&state.db, query.limit).await?;
    Ok(Json(json!({"runs": rows})))
}

/// `GET /runs/{id}/ideas`: persisted ideas of one run, best first.
pub async fn run_ideas(
    State(state): State<Arc<AppState>>,
    Path(run_id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    let rows = ideas::ideas_for_run(&state.db, run_id).await?;

    let expand = |raw: &str| -> Value {
        serde_json::from_str(raw).unwrap_or(Value::Null)
    };
    let ideas: Vec<Value> = rows
        .iter()
        .map(|row| {
            json!({
                "id": row.id,
                "run_id": row.run_id,
                "name": row.name,
                "name_norm": row.name_norm,
                "score": row.score,
                "one_liner": row.one_liner,
                "target_user": row.target_user,
                "core_features": expand(&row.core_features),
                "why_now": row.why_now,
                "pricing_hint": row.pricing_hint,
                "rationale": row.rationale,
                "representative_post_ids": expand(&row.representative_post_ids),
                "posts_in_common": row.posts_in_common,
                "confidence_level": row.confidence_level,
                "pattern_evidence": row.pattern_evidence,
                "payload": expand(&row.payload),
                "created_at": row.created_at,
            })
        })
        .collect();

    Ok(Json(json!({"run_id": run_id, "ideas": ideas})))
}

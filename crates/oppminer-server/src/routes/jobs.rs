//! Job trigger and inspection endpoints.
//!
//! `POST /generate-ideas` validates the parameters, creates the job row,
//! spawns the orchestration as a detached task, and returns the job id
//! immediately. The job row is the canonical outcome channel; readers
//! poll `GET /jobs/{id}` for progress and the terminal result.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use oppminer_core::llm::client::{LlmClient, LlmClientOptions};
use oppminer_core::pipeline::{orchestrate, JobParams};
use oppminer_core::store::jobs::{self, JobRow};

use crate::error::ApiError;
use crate::state::AppState;

fn default_list_limit() -> u32 {
    20
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default = "default_list_limit")]
    pub limit: u32,
}

/// Render a job row with its JSON blobs expanded.
fn job_json(row: &JobRow) -> Value {
    let expand = |raw: &Option<String>| -> Value {
        raw.as_deref()
            .and_then(|s| serde_json::from_str(s).ok())
            .unwrap_or(Value::Null)
    };
    json!({
        "id": row.id,
        "status": row.status,
        "created_at": row.created_at,
        "started_at": row.started_at,
        "completed_at": row.completed_at,
        "parameters": expand(&row.parameters),
        "progress": expand(&row.progress),
        "result": expand(&row.result),
        "error": row.error,
    })
}

/// `POST /generate-ideas`: trigger one orchestration.
pub async fn generate_ideas(
    State(state): State<Arc<AppState>>,
    Json(params): Json<JobParams>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    params
        .validate()
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let job_id = params
        .job_id
        .clone()
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let params_json = serde_json::to_string(&params).unwrap_or_else(|_| "{}".to_string());

    let created = jobs::create_job(&state.db, &job_id, &params_json).await?;
    if !created {
        // The id doubles as an idempotency key: re-triggering an
        // existing job returns it unchanged.
        tracing::info!(job_id, "job already exists, not re-triggering");
        return Ok((
            StatusCode::OK,
            Json(json!({"success": true, "job_id": job_id, "status": "exists"})),
        ));
    }

    // Missing credentials fail the job immediately.
    if state.config.llm.api_key.is_empty() {
        let message = "missing required config field: llm.api_key";
        jobs::fail_job(&state.db, &job_id, message).await?;
        return Ok((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"success": false, "error": message, "job_id": job_id})),
        ));
    }

    let mut options = LlmClientOptions::from_config(&state.config.llm);
    if let Some(model) = &params.ideation_model {
        options.ideation_model = model.clone();
    }
    if let Some(model) = &params.validation_model {
        options.validation_model = model.clone();
    }

    let llm = Arc::new(LlmClient::new(Arc::clone(&state.provider), options));
    let pool = state.db.clone();
    let pacing = state.pacing.clone();
    let spawned_id = job_id.clone();

    tracing::info!(
        job_id,
        platform = %params.platform,
        days = params.days,
        "job accepted, starting orchestration"
    );
    tokio::spawn(async move {
        // The terminal state is written to the job row; an Err here has
        // already been recorded there.
        let _ = orchestrate::execute(&pool, llm, &spawned_id, params, pacing).await;
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({"success": true, "job_id": job_id, "status": "pending"})),
    ))
}

/// `GET /jobs/{id}`: one job row.
pub async fn get_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let row = jobs::get_job(&state.db, &id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("no job with id '{id}'")))?;
    Ok(Json(job_json(&row)))
}

/// `GET /jobs`: recent jobs, newest first.
pub async fn list_jobs(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Value>, ApiError> {
    let rows = jobs::list_jobs(&state.db, query.limit).await?;
    let jobs: Vec<Value> = rows.iter().map(job_json).collect();
    Ok(Json(json!({"jobs": jobs})))
}

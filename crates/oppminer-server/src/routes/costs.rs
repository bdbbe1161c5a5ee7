//! LLM spend reporting over the persisted usage ledger.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use oppminer_core::store::llm_usage;

use crate::error::ApiError;
use crate::state::AppState;

/// `GET /costs/summary`: spend grouped by model and by call type.
pub async fn summary(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
    let by_model = llm_usage::model_breakdown(&state.db).await?;
    let by_type = llm_usage::type_breakdown(&state.db).await?;

    let total: f64 = by_model.iter().map(|row| row.cost).sum();
    Ok(Json(json!({
        "total_cost": total,
        "by_model": by_model,
        "by_type": by_type,
    })))
}

//! LLM usage tracking: stores per-call token counts and costs.

use super::DbPool;
use crate::error::StorageError;

/// Summary of spend grouped by model.
#[derive(Debug, serde::Serialize)]
pub struct ModelCostBreakdown {
    pub model: String,
    pub cost: f64,
    pub calls: i64,
    pub input_tokens: i64,
    pub output_tokens: i64,
}

/// Summary of spend grouped by call type (ideation/validation).
#[derive(Debug, serde::Serialize)]
pub struct TypeCostBreakdown {
    pub call_type: String,
    pub cost: f64,
    pub calls: i64,
}

/// Insert one LLM usage record.
pub async fn insert_llm_usage(
    pool: &DbPool,
    job_id: &str,
    call_type: &str,
    model: &str,
    input_tokens: u32,
    output_tokens: u32,
    cost_usd: f64,
) -> Result<(), StorageError> {
    sqlx::query(
        "INSERT INTO llm_usage (job_id, call_type, model, input_tokens, output_tokens, cost_usd) \
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(job_id)
    .bind(call_type)
    .bind(model)
    .bind(input_tokens)
    .bind(output_tokens)
    .bind(cost_usd)
    .execute(pool)
    .await
    .map_err(|e| StorageError::Query { source: e })?;
    Ok(())
}

/// Spend grouped by model, highest first.
pub async fn model_breakdown(pool: &DbPool) -> Result<Vec<ModelCostBreakdown>, StorageError> {
    let rows: Vec<(String, f64, i64, i64, i64)> = sqlx::query_as(
        "SELECT model, COALESCE(SUM(cost_usd), 0.0), COUNT(*), \
                COALESCE(SUM(input_tokens), 0), COALESCE(SUM(output_tokens), 0) \
         FROM llm_usage GROUP BY model ORDER BY SUM(cost_usd) DESC",
    )
    .fetch_all(pool)
    .await
    .map_err(|e| StorageError::Query { source: e })?;

    Ok(rows
        .into_iter()
        .map(|(model, cost, calls, input_tokens, output_tokens)| ModelCostBreakdown {
            model,
            cost,
            calls,
            input_tokens,
            output_tokens,
        })
        .collect())
}

/// Spend grouped by call type, highest first.
pub async fn type_breakdown(pool: &DbPool) -> Result<Vec<TypeCostBreakdown>, StorageError> {
    let rows: Vec<(String, f64, i64)> = sqlx::query_as(
        "SELECT call_type, COALESCE(SUM(cost_usd), 0.0), COUNT(*) \
         FROM llm_usage GROUP BY call_type ORDER BY SUM(cost_usd) DESC",
    )
    .fetch_all(pool)
    .await
    .map_err(|e| StorageError::Query { source: e })?;

    Ok(rows
        .into_iter()
        .map(|(call_type, cost, calls)| TypeCostBreakdown {
            call_type,
            cost,
            calls,
        })
        .collect())
}

//! Service banner and health endpoints.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use crate::state::AppState;

/// `GET /`: service banner with the endpoint list.
pub async fn banner() -> Json<Value> {
    Json(json!({
        "service": "oppminer",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "ok",
        "endpoints": [
            "GET /",
            "GET /health",
            "POST /generate-ideas",
            "GET /jobs",
            "GET /jobs/{id}",
            "GET /runs",
            "GET /runs/{id}/ideas",
            "GET /costs/summary",
        ],
    }))
}

/// Resident set size in bytes, when the platform exposes it.
fn memory_rss_bytes() -> Option<u64> {
    let statm = std::fs::read_to_string("/proc/self/statm").ok()?;
    let rss_pages: u64 = statm.split_whitespace().nth(1)?.parse().ok()?;
    Some(rss_pages * 4096)
}

/// `GET /health`: liveness with uptime, memory, and a DB probe.
pub async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    let database = match oppminer_core::store::ping(&state.db).await {
        Ok(()) => "ok",
        Err(_) => "error",
    };

    Json(json!({
        "status": if database == "ok" { "healthy" } else { "degraded" },
        "timestamp": chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string(),
        "uptime_secs": state.started_at.elapsed().as_secs(),
        "memory": { "rss_bytes": memory_rss_bytes() },
        "database": database,
    }))
}

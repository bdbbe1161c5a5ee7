//! oppminer HTTP API server.
//!
//! Exposes the trigger surface for the idea-generation pipeline plus
//! read endpoints over jobs, runs, ideas, and LLM spend.

pub mod error;
pub mod routes;
pub mod state;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the complete axum router with all API routes and middleware.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(routes::health::banner))
        .route("/health", get(routes::health::health))
        .route("/generate-ideas", post(routes::jobs::generate_ideas))
        .route("/jobs", get(routes::jobs::list_jobs))
        .route("/jobs/{id}", get(routes::jobs::get_job))
        .route("/runs", get(routes::runs::list_runs))
        .route("/runs/{id}/ideas", get(routes::runs::run_ideas))
        .route("/costs/summary", get(routes::costs::summary))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

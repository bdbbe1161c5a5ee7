//! # oppminer-core
//!
//! Core library for the oppminer product-opportunity mining pipeline.
//!
//! Given a window of ingested social-media posts, one job selects
//! candidates from the store, classifies each as a commercial
//! opportunity, clusters related opportunities over pre-computed
//! similarity edges, names each cluster's theme, asks an LLM for scored
//! product ideas per cluster, optionally re-scores the best ideas through
//! a stronger model, and persists the ideas with a run header. The job
//! row records progress throughout and carries the terminal result.
//!
//! Modules:
//! - [`store`]: SQLite persistence (posts, runs, ideas, jobs, usage).
//! - [`llm`]: chat-completions transport plus the retrying client.
//! - [`classify`]: pure opportunity classification.
//! - [`cluster`]: union-find clustering over similarity edges.
//! - [`pipeline`]: the staged pipeline and its orchestrator.
//! - [`config`]: layered configuration (defaults, TOML, env).

pub mod classify;
pub mod cluster;
pub mod config;
pub mod cost;
pub mod error;
pub mod idea;
pub mod llm;
pub mod pipeline;
pub mod store;

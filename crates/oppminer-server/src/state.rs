//! Shared application state for the oppminer server.

use std::sync::Arc;
use std::time::Instant;

use oppminer_core::config::Config;
use oppminer_core::llm::ChatProvider;
use oppminer_core::pipeline::Pacing;
use oppminer_core::store::DbPool;

/// Shared application state accessible by all route handlers.
pub struct AppState {
    /// SQLite connection pool.
    pub db: DbPool,
    /// Loaded service configuration.
    pub config: Config,
    /// Chat-completions transport, shared across jobs. Each job wraps it
    /// in its own `LlmClient` (per-job ledger and breaker state).
    pub provider: Arc<dyn ChatProvider>,
    /// Stage pacing handed to each spawned job.
    pub pacing: Pacing,
    /// Process start time, for the health endpoint's uptime.
    pub started_at: Instant,
}

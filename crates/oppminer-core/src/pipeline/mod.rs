//! The idea-generation pipeline.
//!
//! Stages are atomic modules (theme naming, ideation, automation boost,
//! dedup, validation) composed by [`orchestrate`], which owns the job row
//! and the partial-failure semantics.

pub mod automation;
pub mod dedup;
pub mod ideation;
pub mod orchestrate;
pub mod parse;
pub mod themes;
pub mod validate;

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

/// Ideas scoring below this are discarded before dedup.
pub const MIN_SCORE_THRESHOLD: f64 = 30.0;

/// Clusters handled per concurrent theme-naming batch, and per paced
/// ideation batch.
pub const MAX_CLUSTERS_PER_BATCH: usize = 50;

/// Representative posts sampled into theme and ideation prompts.
pub const MAX_REPRESENTATIVE_POSTS: usize = 100;

/// Existing idea names listed in the "avoid these" prompt block.
pub const MAX_EXISTING_IDEAS: usize = 100;

/// How far back the dedup reference set reaches.
pub const DEDUP_LOOKBACK_DAYS: u32 = 90;

/// Rough cost of one validator call, used by the budget guard.
pub const VALIDATION_CALL_ESTIMATE_USD: f64 = 0.05;

/// Name-similarity threshold against ideas accepted in this batch.
pub const DEDUP_BATCH_THRESHOLD: f64 = 0.4;

/// Stricter threshold against names persisted by prior runs.
pub const DEDUP_PERSISTED_THRESHOLD: f64 = 0.8;

fn default_platform() -> String {
    "all".to_string()
}
fn default_days() -> u32 {
    14
}
fn default_limit() -> u32 {
    1000
}
fn default_min_saas_score() -> f64 {
    30.0
}
fn default_similarity_threshold() -> f64 {
    0.3
}
fn default_min_cluster_size() -> usize {
    2
}
fn default_true() -> bool {
    true
}
fn default_validation_threshold() -> f64 {
    70.0
}
fn default_max_validation_ideas() -> usize {
    10
}

/// Parameters of one job, as accepted by the trigger surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobParams {
    /// Idempotency key for the job row; generated when absent.
    #[serde(default)]
    pub job_id: Option<String>,
    /// Platform filter; "all" disables it.
    #[serde(default = "default_platform")]
    pub platform: String,
    /// Lookback window in days.
    #[serde(default = "default_days")]
    pub days: u32,
    /// Max rows returned by the initial post select.
    #[serde(default = "default_limit")]
    pub limit: u32,
    /// Lower score bound for the database-scored classification path.
    #[serde(default = "default_min_saas_score")]
    pub min_saas_score: f64,
    /// Similarity threshold for cluster building.
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,
    /// Minimum cluster size.
    #[serde(default = "default_min_cluster_size")]
    pub min_cluster_size: usize,
    /// Truncates the cluster list before ideation, when set.
    #[serde(default)]
    pub max_clusters_to_process: Option<usize>,
    /// Toggles the workflow-automation boost pass.
    #[serde(default = "default_true")]
    pub enable_automation_boost: bool,
    /// Toggles the market-validation pass.
    #[serde(default = "default_true")]
    pub enable_validation: bool,
    /// Minimum score for an idea to be validated.
    #[serde(default = "default_validation_threshold")]
    pub validation_threshold: f64,
    /// Cap on validator calls.
    #[serde(default = "default_max_validation_ideas")]
    pub max_validation_ideas: usize,
    /// Ideation model override.
    #[serde(default)]
    pub ideation_model: Option<String>,
    /// Validation model override.
    #[serde(default)]
    pub validation_model: Option<String>,
    /// Sentiment bound for the heuristic complaint rule.
    #[serde(default)]
    pub complaint_sentiment_threshold: f64,
}

impl Default for JobParams {
    fn default() -> Self {
        serde_json::from_str("{}").expect("defaults deserialize")
    }
}

impl JobParams {
    /// Reject out-of-range parameters before a job row is created.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.days == 0 {
            return Err(PipelineError::InvalidParameter {
                field: "days".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.limit == 0 {
            return Err(PipelineError::InvalidParameter {
                field: "limit".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err(PipelineError::InvalidParameter {
                field: "similarity_threshold".to_string(),
                message: "must be within [0, 1]".to_string(),
            });
        }
        if self.min_cluster_size == 0 {
            return Err(PipelineError::InvalidParameter {
                field: "min_cluster_size".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if !(0.0..=100.0).contains(&self.validation_threshold) {
            return Err(PipelineError::InvalidParameter {
                field: "validation_threshold".to_string(),
                message: "must be within [0, 100]".to_string(),
            });
        }
        Ok(())
    }

    /// ISO-8601 lower bound for the post select (`now − days`).
    pub fn since_timestamp(&self) -> String {
        let since = chrono::Utc::now() - chrono::Duration::seconds(i64::from(self.days) * 86_400);
        since.format("%Y-%m-%dT%H:%M:%SZ").to_string()
    }
}

/// Stage pacing. Defaults match the provider's rate windows; tests zero
/// them out.
#[derive(Debug, Clone)]
pub struct Pacing {
    /// Sleep between clusters during ideation.
    pub inter_cluster_delay: Duration,
    /// Sleep between ideation batches of [`MAX_CLUSTERS_PER_BATCH`].
    pub ideation_batch_delay: Duration,
    /// Sleep between theme-naming batches.
    pub theme_batch_delay: Duration,
    /// Sleep between validator calls.
    pub validation_delay: Duration,
    /// Elapsed-time budget checked at the top of each cluster loop.
    pub max_processing_time: Option<Duration>,
}

impl Default for Pacing {
    fn default() -> Self {
        Pacing {
            inter_cluster_delay: Duration::from_secs(5),
            ideation_batch_delay: Duration::from_secs(60),
            theme_batch_delay: Duration::from_secs(30),
            validation_delay: Duration::from_secs(2),
            max_processing_time: Some(Duration::from_secs(15 * 60)),
        }
    }
}

impl Pacing {
    /// No sleeps, no time budget. For tests and local smoke runs.
    pub fn immediate() -> Self {
        Pacing {
            inter_cluster_delay: Duration::ZERO,
            ideation_batch_delay: Duration::ZERO,
            theme_batch_delay: Duration::ZERO,
            validation_delay: Duration::ZERO,
            max_processing_time: None,
        }
    }
}

/// Advisory progress blob written to the job row at stage boundaries.
/// Readers must tolerate missing fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobProgress {
    #[serde(default)]
    pub current_step: String,
    #[serde(default)]
    pub total_steps: u32,
    #[serde(default)]
    pub completed_steps: u32,
    #[serde(default)]
    pub posts_processed: usize,
    #[serde(default)]
    pub opportunities_found: usize,
    #[serde(default)]
    pub clusters_built: usize,
    #[serde(default)]
    pub themes_named: usize,
    #[serde(default)]
    pub clusters_processed: usize,
    #[serde(default)]
    pub ideas_generated: usize,
    #[serde(default)]
    pub ideas_validated: usize,
}

/// Terminal result summary written to a completed job row.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobResult {
    #[serde(default)]
    pub posts_processed: usize,
    #[serde(default)]
    pub opportunities_found: usize,
    #[serde(default)]
    pub clusters_total: usize,
    #[serde(default)]
    pub clusters_processed: usize,
    #[serde(default)]
    pub ideas_generated: usize,
    #[serde(default)]
    pub ideas_inserted: u64,
    #[serde(default)]
    pub ideas_validated: usize,
    #[serde(default)]
    pub rate_limited: bool,
    #[serde(default)]
    pub run_id: Option<i64>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub duration_ms: u64,
    #[serde(default)]
    pub cost: Option<crate::cost::CostLedger>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_defaults_match_contract() {
        let params = JobParams::default();
        assert_eq!(params.platform, "all");
        assert_eq!(params.days, 14);
        assert_eq!(params.limit, 1000);
        assert!((params.min_saas_score - 30.0).abs() < f64::EPSILON);
        assert!((params.similarity_threshold - 0.3).abs() < f64::EPSILON);
        assert_eq!(params.min_cluster_size, 2);
        assert!(params.max_clusters_to_process.is_none());
        assert!(params.enable_automation_boost);
        assert!(params.enable_validation);
        assert!((params.validation_threshold - 70.0).abs() < f64::EPSILON);
        assert_eq!(params.max_validation_ideas, 10);
        assert!((params.complaint_sentiment_threshold).abs() < f64::EPSILON);
    }

    #[test]
    fn params_validate_rejects_bad_threshold() {
        let mut params = JobParams::default();
        params.similarity_threshold = 1.5;
        assert!(params.validate().is_err());

        params.similarity_threshold = 0.3;
        params.days = 0;
        assert!(params.validate().is_err());

        params.days = 14;
        assert!(params.validate().is_ok());
    }

    #[test]
    fn partial_body_fills_defaults() {
        let params: JobParams =
            serde_json::from_str(r#"{"platform":"reddit","days":7}"#).expect("parse");
        assert_eq!(params.platform, "reddit");
        assert_eq!(params.days, 7);
        assert_eq!(params.limit, 1000);
    }

    #[test]
    fn progress_tolerates_missing_fields() {
        let progress: JobProgress =
            serde_json::from_str(r#"{"current_step":"cluster"}"#).expect("parse");
        assert_eq!(progress.current_step, "cluster");
        assert_eq!(progress.ideas_generated, 0);
    }

    #[test]
    fn since_timestamp_is_in_the_past() {
        let params = JobParams::default();
        let since = params.since_timestamp();
        let now = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string();
        assert!(since < now);
    }
}

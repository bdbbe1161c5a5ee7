//! The job orchestrator.
//!
//! Drives one job through its ten steps: fetch, classify, cluster, name
//! themes, fetch recent idea names, create the run row, generate ideas,
//! validate, persist, finalize. The job row is updated at every stage
//! boundary; progress writes are advisory and never block the pipeline.
//!
//! Failure semantics: a fatal initial read, a parameter error, or the
//! final insert failing ends the job as `failed`. A single cluster's LLM
//! failure is logged and skipped. Daily-quota exhaustion stops ideation
//! early, marks the result `rate_limited`, and still persists everything
//! accumulated so far.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use crate::classify::{classify, OpportunityPost};
use crate::cluster::{build_clusters_with_fallback, FALLBACK_SIMILARITY_THRESHOLD};
use crate::error::{LlmError, PipelineError};
use crate::idea::Idea;
use crate::llm::client::LlmClient;
use crate::pipeline::dedup::Deduplicator;
use crate::pipeline::{
    ideation, themes, validate, JobParams, JobProgress, JobResult, Pacing,
    DEDUP_LOOKBACK_DAYS, MAX_CLUSTERS_PER_BATCH, MAX_EXISTING_IDEAS,
};
use crate::store::{self, DbPool};

/// Run one job to its terminal state, writing the job row throughout.
///
/// Returns the terminal result (also persisted on the row). Any error
/// returned here has already been written to the row as `failed`.
pub async fn execute(
    pool: &DbPool,
    llm: Arc<LlmClient>,
    job_id: &str,
    params: JobParams,
    pacing: Pacing,
) -> Result<JobResult, PipelineError> {
    let started = Instant::now();

    if let Err(e) = store::jobs::mark_running(pool, job_id).await {
        tracing::warn!(job_id, error = %e, "failed to mark job running");
    }

    let outcome = run_pipeline(pool, &llm, job_id, &params, &pacing, started).await;

    // Best-effort usage persistence; the in-row cost breakdown is the
    // canonical record.
    for record in llm.drain_usage() {
        if let Err(e) = store::llm_usage::insert_llm_usage(
            pool,
            job_id,
            record.call_type.as_str(),
            &record.model,
            record.input_tokens,
            record.output_tokens,
            record.cost,
        )
        .await
        {
            tracing::warn!(job_id, error = %e, "failed to persist LLM usage record");
            break;
        }
    }

    match outcome {
        Ok(mut result) => {
            result.duration_ms = started.elapsed().as_millis() as u64;
            result.cost = Some(llm.ledger());
            let result_json = serde_json::to_string(&result).unwrap_or_else(|_| "{}".to_string());
            if let Err(e) = store::jobs::complete_job(pool, job_id, &result_json).await {
                tracing::error!(job_id, error = %e, "failed to write terminal result row");
            }
            tracing::info!(
                job_id,
                ideas = result.ideas_generated,
                inserted = result.ideas_inserted,
                clusters = result.clusters_processed,
                rate_limited = result.rate_limited,
                duration_ms = result.duration_ms,
                "job completed"
            );
            Ok(result)
        }
        Err(error) => {
            let message = error.to_string();
            tracing::error!(job_id, error = %message, "job failed");
            if let Err(e) = store::jobs::fail_job(pool, job_id, &message).await {
                tracing::error!(job_id, error = %e, "failed to write terminal error row");
            }
            Err(error)
        }
    }
}

/// Advisory progress write; logs and swallows failures.
async fn write_progress(
    pool: &DbPool,
    job_id: &str,
    progress: &mut JobProgress,
    step: &str,
    completed_steps: u32,
) {
    progress.current_step = step.to_string();
    progress.completed_steps = completed_steps;
    let json = serde_json::to_string(progress).unwrap_or_else(|_| "{}".to_string());
    if let Err(e) = store::jobs::set_progress(pool, job_id, &json).await {
        tracing::warn!(job_id, step, error = %e, "progress write failed (ignored)");
    }
}

async fn run_pipeline(
    pool: &DbPool,
    llm: &Arc<LlmClient>,
    job_id: &str,
    params: &JobParams,
    pacing: &Pacing,
    started: Instant,
) -> Result<JobResult, PipelineError> {
    params.validate()?;

    let mut progress = JobProgress {
        total_steps: 10,
        ..JobProgress::default()
    };
    let mut result = JobResult::default();

    // Step 1: fetch candidate posts. A store failure here is fatal.
    write_progress(pool, job_id, &mut progress, "fetch", 0).await;
    let since = params.since_timestamp();
    let posts = store::posts::select_posts(
        pool,
        &params.platform,
        &since,
        Some(params.min_saas_score),
        params.limit,
    )
    .await?;
    result.posts_processed = posts.len();
    progress.posts_processed = posts.len();

    if posts.is_empty() {
        result.message = Some(format!(
            "no posts for platform '{}' in the last {} days",
            params.platform, params.days
        ));
        return Ok(result);
    }

    // Step 2: classify and filter.
    write_progress(pool, job_id, &mut progress, "classify", 1).await;
    let mut type_counts: HashMap<&'static str, usize> = HashMap::new();
    let opportunities: Vec<OpportunityPost> = posts
        .into_iter()
        .filter_map(|post| {
            let classification = classify(
                &post,
                params.min_saas_score,
                params.complaint_sentiment_threshold,
            );
            classification.is_opportunity.then(|| {
                *type_counts
                    .entry(classification.opportunity_type.as_str())
                    .or_insert(0) += 1;
                OpportunityPost {
                    post,
                    opportunity_type: classification.opportunity_type,
                    opportunity_signals: classification.opportunity_signals,
                }
            })
        })
        .collect();
    result.opportunities_found = opportunities.len();
    progress.opportunities_found = opportunities.len();
    tracing::info!(
        job_id,
        opportunities = opportunities.len(),
        by_type = ?type_counts,
        "classification complete"
    );

    // Step 3: cluster over the similarity graph. The similarity read is
    // part of the initial selection and fatal on error.
    write_progress(pool, job_id, &mut progress, "cluster", 2).await;
    let post_ids: Vec<i64> = opportunities.iter().map(|o| o.post.id).collect();
    let similarity = store::posts::select_similarity_rows(pool, &post_ids).await?;
    let outcome = build_clusters_with_fallback(
        opportunities,
        &similarity,
        params.similarity_threshold,
        params.min_cluster_size,
    );
    let mut clusters = outcome.clusters;
    result.clusters_total = clusters.len();
    progress.clusters_built = clusters.len();

    if clusters.is_empty() {
        result.message = Some(format!(
            "no clusters of size {}+ at similarity threshold {} (fallback {} also tried)",
            params.min_cluster_size, params.similarity_threshold, FALLBACK_SIMILARITY_THRESHOLD
        ));
        return Ok(result);
    }

    if let Some(max) = params.max_clusters_to_process {
        clusters.truncate(max);
    }

    // Step 4: theme naming (bounded fan-out; failures fall back).
    write_progress(pool, job_id, &mut progress, "name_themes", 3).await;
    let named = themes::name_themes(llm, &mut clusters, pacing).await;
    progress.themes_named = named;

    // Step 5: recent idea names for dedup. Non-fatal: dedup degrades to
    // in-batch only.
    write_progress(pool, job_id, &mut progress, "fetch_recent_ideas", 4).await;
    let recent = match store::ideas::recent_idea_names(
        pool,
        DEDUP_LOOKBACK_DAYS,
        MAX_EXISTING_IDEAS as u32,
    )
    .await
    {
        Ok(pairs) => pairs,
        Err(e) => {
            tracing::warn!(job_id, error = %e, "recent idea names unavailable, dedup degraded");
            Vec::new()
        }
    };

    // Step 6: create the run header.
    write_progress(pool, job_id, &mut progress, "create_run", 5).await;
    let run_id =
        store::runs::create_run(pool, &params.platform, params.days, params.limit, None).await?;
    result.run_id = Some(run_id);

    // Step 7: sequential per-cluster ideation. Each prompt sees every
    // idea accepted so far, so this stage must not run concurrently.
    write_progress(pool, job_id, &mut progress, "generate_ideas", 6).await;
    let mut dedup = Deduplicator::new(&recent);
    let mut accepted: Vec<Idea> = Vec::new();
    let cluster_count = clusters.len();

    for (index, cluster) in clusters.iter().enumerate() {
        if let Some(budget) = pacing.max_processing_time {
            if started.elapsed() > budget {
                tracing::warn!(job_id, "processing time budget exceeded, stopping ideation");
                result.message = Some("processing time budget exceeded".to_string());
                break;
            }
        }

        let avoid: Vec<(String, String)> = recent
            .iter()
            .cloned()
            .chain(
                accepted
                    .iter()
                    .map(|idea| (idea.name.clone(), idea.target_user.clone())),
            )
            .collect();

        match ideation::generate_for_cluster(llm, cluster, &avoid, params.enable_automation_boost)
            .await
        {
            Ok(ideas) => {
                for idea in ideas {
                    match dedup.screen(&idea) {
                        Ok(()) => accepted.push(idea),
                        Err(rejection) => {
                            tracing::debug!(
                                job_id,
                                cluster = %cluster.cluster_id,
                                name = %idea.name,
                                ?rejection,
                                "idea rejected by dedup"
                            );
                        }
                    }
                }
                result.clusters_processed += 1;
            }
            Err(LlmError::DailyLimitExceeded { model }) => {
                tracing::warn!(
                    job_id,
                    model = %model,
                    clusters_processed = result.clusters_processed,
                    "daily request limit exhausted, completing with partial results"
                );
                result.rate_limited = true;
                result.message = Some(format!(
                    "daily request limit exhausted on model '{model}' after {} clusters",
                    result.clusters_processed
                ));
                break;
            }
            Err(e) => {
                tracing::warn!(
                    job_id,
                    cluster = %cluster.cluster_id,
                    error = %e,
                    "idea generation failed for cluster, continuing"
                );
                result.clusters_processed += 1;
            }
        }

        progress.clusters_processed = result.clusters_processed;
        progress.ideas_generated = accepted.len();
        write_progress(pool, job_id, &mut progress, "generate_ideas", 6).await;

        if index + 1 < cluster_count {
            if (index + 1) % MAX_CLUSTERS_PER_BATCH == 0 {
                tokio::time::sleep(pacing.ideation_batch_delay).await;
            } else {
                tokio::time::sleep(pacing.inter_cluster_delay).await;
            }
        }
    }
    result.ideas_generated = accepted.len();

    // Step 8: validation of the top ideas, unless disabled, degraded, or
    // rate-limited out.
    write_progress(pool, job_id, &mut progress, "validate", 7).await;
    if params.enable_validation && !accepted.is_empty() && !result.rate_limited {
        if llm.fallback_mode() {
            tracing::warn!(job_id, "fallback mode set, skipping validation pass");
        } else {
            result.ideas_validated = validate::validate_top_ideas(
                llm,
                &mut accepted,
                params.validation_threshold,
                params.max_validation_ideas,
                pacing,
            )
            .await;
            progress.ideas_validated = result.ideas_validated;
        }
    }

    // Step 9: persist. A failure here is fatal; accumulated ideas are
    // only considered delivered once this succeeds.
    write_progress(pool, job_id, &mut progress, "persist", 8).await;
    result.ideas_inserted = store::ideas::insert_ideas(pool, run_id, &accepted).await?;

    // Step 10: finalize (the caller writes the terminal row).
    write_progress(pool, job_id, &mut progress, "finalize", 9).await;
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::client::tests::{fast_options, ScriptedProvider};
    use crate::llm::client::LlmClientOptions;
    use crate::store::init_test_db;
    use crate::store::posts::{insert_post, Post, SimilarityEdge};
    use serde_json::json;

    fn theme_response() -> Result<crate::llm::ChatResponse, crate::error::LlmError> {
        ScriptedProvider::ok(r#"{"theme": "users drowning in manual work"}"#)
    }

    fn idea_response(name: &str) -> Result<crate::llm::ChatResponse, crate::error::LlmError> {
        ScriptedProvider::ok(
            &json!({
                "ideas": [{
                    "score": 75,
                    "name": name,
                    "one_liner": "helps with the cluster pain",
                    "target_user": format!("{name} users"),
                    "core_features": ["feature"],
                    "representative_post_ids": [],
                    "does_not_exist": "unknown"
                }]
            })
            .to_string(),
        )
    }

    fn daily_limit() -> Result<crate::llm::ChatResponse, crate::error::LlmError> {
        Err(crate::error::LlmError::RateLimited {
            retry_after_secs: Some(86_400),
            daily: true,
        })
    }

    fn no_fallback_options() -> LlmClientOptions {
        let mut options = fast_options();
        options.fallback_model = None;
        options
    }

    async fn seed_scored_post(
        pool: &DbPool,
        id: i64,
        edges: &[(i64, f64)],
    ) {
        let mut post = Post::fixture(id, "reddit", "2099-01-01T00:00:00Z");
        post.saas_score = Some(80.0);
        post.sentiment = -0.4;
        post.title = "manual workflow pain".to_string();
        post.body = format!("post {id} complains about repetitive process work");
        post.similarity_scores = Some(
            edges
                .iter()
                .map(|&(other_post_id, score)| SimilarityEdge {
                    other_post_id,
                    score,
                })
                .collect(),
        );
        insert_post(pool, &post).await.expect("seed post");
    }

    async fn run_job(
        pool: &DbPool,
        provider: Arc<ScriptedProvider>,
        options: LlmClientOptions,
        params: JobParams,
    ) -> Result<JobResult, PipelineError> {
        let job_id = "job-test";
        store::jobs::create_job(pool, job_id, "{}")
            .await
            .expect("create job");
        let llm = Arc::new(LlmClient::new(provider, options));
        execute(pool, llm, job_id, params, Pacing::immediate()).await
    }

    // Zero posts complete early with zeroed counters.
    #[tokio::test]
    async fn zero_posts_completes_early() {
        let pool = init_test_db().await.expect("init db");
        let provider = Arc::new(ScriptedProvider::new(vec![]));

        let mut params = JobParams::default();
        params.platform = "reddit".to_string();

        let result = run_job(&pool, provider.clone(), no_fallback_options(), params)
            .await
            .expect("job");

        assert_eq!(result.posts_processed, 0);
        assert_eq!(result.clusters_processed, 0);
        assert_eq!(result.ideas_generated, 0);
        assert!(result.message.is_some());
        // No LLM calls were made at all.
        assert!(provider.calls.lock().expect("lock").is_empty());

        let job = store::jobs::get_job(&pool, "job-test")
            .await
            .expect("get")
            .expect("row");
        assert_eq!(job.status, "completed");
        assert!(job.result.is_some());
        assert!(job.error.is_none());
    }

    #[tokio::test]
    async fn zero_clusters_completes_with_threshold_message() {
        let pool = init_test_db().await.expect("init db");
        // Two opportunity posts, no edges at all.
        seed_scored_post(&pool, 1, &[]).await;
        seed_scored_post(&pool, 2, &[]).await;

        let provider = Arc::new(ScriptedProvider::new(vec![]));
        let result = run_job(
            &pool,
            provider,
            no_fallback_options(),
            JobParams::default(),
        )
        .await
        .expect("job");

        assert_eq!(result.posts_processed, 2);
        assert_eq!(result.opportunities_found, 2);
        assert_eq!(result.clusters_total, 0);
        let message = result.message.expect("message");
        assert!(message.contains("0.3"));
        assert!(message.contains("0.1"));
    }

    #[tokio::test]
    async fn happy_path_generates_and_persists() {
        let pool = init_test_db().await.expect("init db");
        // One 3-post cluster and one 2-post cluster.
        seed_scored_post(&pool, 1, &[(2, 0.8)]).await;
        seed_scored_post(&pool, 2, &[(3, 0.7)]).await;
        seed_scored_post(&pool, 3, &[]).await;
        seed_scored_post(&pool, 4, &[(5, 0.9)]).await;
        seed_scored_post(&pool, 5, &[]).await;

        let provider = Arc::new(ScriptedProvider::new(vec![
            // Two theme calls (concurrent, identical responses).
            theme_response(),
            theme_response(),
            // Two ideation calls, one per cluster in size order.
            idea_response("Workflow Rescue"),
            idea_response("Process Untangler"),
            // Two validation calls (both ideas boosted over 70).
            ScriptedProvider::ok(
                &json!({"ideas_analysis": [{"revised_score": 85, "market_size": "large"}]})
                    .to_string(),
            ),
            ScriptedProvider::ok(
                &json!({"ideas_analysis": [{"revised_score": 78, "market_size": "medium"}]})
                    .to_string(),
            ),
        ]));

        let result = run_job(
            &pool,
            provider,
            no_fallback_options(),
            JobParams::default(),
        )
        .await
        .expect("job");

        assert_eq!(result.posts_processed, 5);
        assert_eq!(result.opportunities_found, 5);
        assert_eq!(result.clusters_total, 2);
        assert_eq!(result.clusters_processed, 2);
        assert_eq!(result.ideas_generated, 2);
        assert_eq!(result.ideas_inserted, 2);
        assert_eq!(result.ideas_validated, 2);
        assert!(!result.rate_limited);
        let cost = result.cost.expect("cost");
        assert!(cost.models.contains_key("primary"));

        let run_id = result.run_id.expect("run id");
        let rows = store::ideas::ideas_for_run(&pool, run_id).await.expect("rows");
        assert_eq!(rows.len(), 2);
        // Validation revised the top idea's score to 85.
        assert_eq!(rows[0].score, 85);

        let job = store::jobs::get_job(&pool, "job-test")
            .await
            .expect("get")
            .expect("row");
        assert_eq!(job.status, "completed");
        let progress: crate::pipeline::JobProgress =
            serde_json::from_str(job.progress.as_deref().expect("progress")).expect("parse");
        assert_eq!(progress.current_step, "finalize");
    }

    // Daily exhaustion at cluster 4 completes the job as partial, with
    // the first three clusters' ideas persisted.
    #[tokio::test]
    async fn daily_limit_mid_run_persists_partial_results() {
        let pool = init_test_db().await.expect("init db");
        // Four 2-post clusters.
        for (a, b) in [(1, 2), (3, 4), (5, 6), (7, 8)] {
            seed_scored_post(&pool, a, &[(b, 0.9)]).await;
            seed_scored_post(&pool, b, &[]).await;
        }

        let provider = Arc::new(ScriptedProvider::new(vec![
            theme_response(),
            theme_response(),
            theme_response(),
            theme_response(),
            idea_response("Idea One"),
            idea_response("Idea Two"),
            idea_response("Idea Three"),
            daily_limit(),
        ]));

        let mut params = JobParams::default();
        params.enable_validation = false;

        let result = run_job(&pool, provider, no_fallback_options(), params)
            .await
            .expect("job");

        assert!(result.rate_limited);
        assert_eq!(result.clusters_total, 4);
        assert_eq!(result.clusters_processed, 3);
        assert_eq!(result.ideas_generated, 3);
        assert_eq!(result.ideas_inserted, 3);

        let job = store::jobs::get_job(&pool, "job-test")
            .await
            .expect("get")
            .expect("row");
        assert_eq!(job.status, "completed");
        let stored: JobResult =
            serde_json::from_str(job.result.as_deref().expect("result")).expect("parse");
        assert!(stored.rate_limited);
        assert_eq!(stored.clusters_processed, 3);
    }

    #[tokio::test]
    async fn transient_cluster_failure_is_skipped() {
        let pool = init_test_db().await.expect("init db");
        for (a, b) in [(1, 2), (3, 4)] {
            seed_scored_post(&pool, a, &[(b, 0.9)]).await;
            seed_scored_post(&pool, b, &[]).await;
        }

        // First ideation call persistently 500s until its retry budget
        // runs out; second succeeds. Two attempts keep the failure streak
        // under the circuit-breaker threshold.
        let mut script = vec![theme_response(), theme_response()];
        for _ in 0..2 {
            script.push(Err(crate::error::LlmError::Api {
                status: 500,
                message: "boom".to_string(),
            }));
        }
        script.push(idea_response("Survivor Idea"));
        let provider = Arc::new(ScriptedProvider::new(script));

        let mut params = JobParams::default();
        params.enable_validation = false;

        let mut options = no_fallback_options();
        options.max_attempts = 2;
        let result = run_job(&pool, provider, options, params)
            .await
            .expect("job");

        assert_eq!(result.clusters_processed, 2);
        assert_eq!(result.ideas_generated, 1);
        assert_eq!(result.ideas_inserted, 1);
        assert!(!result.rate_limited);
    }

    #[tokio::test]
    async fn invalid_params_fail_the_job() {
        let pool = init_test_db().await.expect("init db");
        let provider = Arc::new(ScriptedProvider::new(vec![]));

        let mut params = JobParams::default();
        params.similarity_threshold = 2.0;

        let error = run_job(&pool, provider, no_fallback_options(), params)
            .await
            .unwrap_err();
        assert!(matches!(error, PipelineError::InvalidParameter { .. }));

        let job = store::jobs::get_job(&pool, "job-test")
            .await
            .expect("get")
            .expect("row");
        assert_eq!(job.status, "failed");
        assert!(job.error.expect("error").contains("similarity_threshold"));
        assert!(job.result.is_none());
    }

    #[tokio::test]
    async fn final_insert_failure_fails_the_job() {
        let pool = init_test_db().await.expect("init db");
        seed_scored_post(&pool, 1, &[(2, 0.9)]).await;
        seed_scored_post(&pool, 2, &[]).await;

        let provider = Arc::new(ScriptedProvider::new(vec![
            theme_response(),
            idea_response("Doomed Idea"),
        ]));

        // Sabotage the ideas table so the final insert fails. The
        // recent-names read degrades gracefully; the insert is fatal.
        sqlx::query("DROP TABLE ideas")
            .execute(&pool)
            .await
            .expect("drop");

        let mut params = JobParams::default();
        params.enable_validation = false;

        let error = run_job(&pool, provider, no_fallback_options(), params)
            .await
            .unwrap_err();
        assert!(matches!(error, PipelineError::Storage(_)));

        let job = store::jobs::get_job(&pool, "job-test")
            .await
            .expect("get")
            .expect("row");
        assert_eq!(job.status, "failed");
    }

    #[tokio::test]
    async fn max_clusters_truncates_before_ideation() {
        let pool = init_test_db().await.expect("init db");
        for (a, b) in [(1, 2), (3, 4), (5, 6)] {
            seed_scored_post(&pool, a, &[(b, 0.9)]).await;
            seed_scored_post(&pool, b, &[]).await;
        }

        let provider = Arc::new(ScriptedProvider::new(vec![
            theme_response(),
            idea_response("Only Idea"),
        ]));

        let mut params = JobParams::default();
        params.max_clusters_to_process = Some(1);
        params.enable_validation = false;

        let result = run_job(&pool, provider, no_fallback_options(), params)
            .await
            .expect("job");

        assert_eq!(result.clusters_total, 3);
        assert_eq!(result.clusters_processed, 1);
        assert_eq!(result.ideas_generated, 1);
    }

    #[tokio::test]
    async fn usage_records_are_persisted() {
        let pool = init_test_db().await.expect("init db");
        seed_scored_post(&pool, 1, &[(2, 0.9)]).await;
        seed_scored_post(&pool, 2, &[]).await;

        let provider = Arc::new(ScriptedProvider::new(vec![
            theme_response(),
            idea_response("Tracked Idea"),
        ]));

        let mut params = JobParams::default();
        params.enable_validation = false;

        run_job(&pool, provider, no_fallback_options(), params)
            .await
            .expect("job");

        let by_type = store::llm_usage::type_breakdown(&pool).await.expect("types");
        assert_eq!(by_type.len(), 1);
        assert_eq!(by_type[0].call_type, "ideation");
        assert_eq!(by_type[0].calls, 2);
    }
}

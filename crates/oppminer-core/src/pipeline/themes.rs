//! Cluster theme naming.
//!
//! One small LLM call per cluster, fanned out in concurrent batches of
//! up to [`MAX_CLUSTERS_PER_BATCH`]. A failed call falls back to a
//! generic theme; theme naming never fails the job.

use std::sync::Arc;

use tokio::task::JoinSet;

use crate::cluster::Cluster;
use crate::cost::CallType;
use crate::llm::client::LlmClient;
use crate::pipeline::{Pacing, MAX_CLUSTERS_PER_BATCH, MAX_REPRESENTATIVE_POSTS};

const THEME_SYSTEM_PROMPT: &str = "You label clusters of related user complaints scraped from \
social media. Respond with strict JSON: {\"theme\": \"<sentence>\"} where the sentence is \
10-15 words capturing the common complaint pattern across the posts.";

/// Generic theme used when the model call fails.
pub fn fallback_theme(size: usize) -> String {
    format!("Cluster of {size} similar complaints")
}

fn theme_prompt(cluster: &Cluster) -> String {
    let mut prompt = String::with_capacity(4096);
    prompt.push_str(&format!(
        "These {} posts form one cluster of related complaints:\n\n",
        cluster.size
    ));
    for opp in cluster.representatives(MAX_REPRESENTATIVE_POSTS) {
        let excerpt: String = format!("{} {}", opp.post.title, opp.post.body)
            .chars()
            .take(200)
            .collect();
        prompt.push_str(&format!("- {excerpt}\n"));
    }
    prompt.push_str("\nName the common complaint pattern.");
    prompt
}

/// Fill `theme_summary` on every cluster. Returns how many themes came
/// from the model (the rest got the fallback).
pub async fn name_themes(
    llm: &Arc<LlmClient>,
    clusters: &mut [Cluster],
    pacing: &Pacing,
) -> usize {
    let mut named = 0usize;
    let batch_count = clusters.len().div_ceil(MAX_CLUSTERS_PER_BATCH);

    for batch_index in 0..batch_count {
        let start = batch_index * MAX_CLUSTERS_PER_BATCH;
        let end = (start + MAX_CLUSTERS_PER_BATCH).min(clusters.len());

        let mut tasks: JoinSet<(usize, Option<String>)> = JoinSet::new();
        for index in start..end {
            let client = Arc::clone(llm);
            let prompt = theme_prompt(&clusters[index]);
            tasks.spawn(async move {
                let theme = match client
                    .complete(CallType::Ideation, THEME_SYSTEM_PROMPT, &prompt, 100, 0.3)
                    .await
                {
                    Ok(value) => value
                        .get("theme")
                        .and_then(|t| t.as_str())
                        .map(|t| t.trim().to_string())
                        .filter(|t| !t.is_empty()),
                    Err(e) => {
                        tracing::warn!(error = %e, "theme naming call failed");
                        None
                    }
                };
                (index, theme)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            let Ok((index, theme)) = joined else {
                continue;
            };
            match theme {
                Some(theme) => {
                    clusters[index].theme_summary = theme;
                    named += 1;
                }
                None => {
                    clusters[index].theme_summary = fallback_theme(clusters[index].size);
                }
            }
        }

        if batch_index + 1 < batch_count {
            tokio::time::sleep(pacing.theme_batch_delay).await;
        }
    }

    named
}

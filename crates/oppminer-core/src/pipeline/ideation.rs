//! Per-cluster idea generation.
//!
//! Builds one prompt per cluster (theme, aggregate insights, post
//! excerpts, and an avoid-list of recent idea names), asks the ideation
//! model for 1–3 structured ideas, and coerces the untyped response into
//! [`Idea`] records with the automation boost applied.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::classify::OpportunityType;
use crate::cluster::Cluster;
use crate::cost::CallType;
use crate::error::LlmError;
use crate::idea::{name_norm, Existence, Idea};
use crate::llm::client::LlmClient;
use crate::pipeline::parse;
use crate::pipeline::{automation, MAX_EXISTING_IDEAS, MAX_REPRESENTATIVE_POSTS, MIN_SCORE_THRESHOLD};

const IDEATION_SYSTEM_PROMPT: &str = "You are a product strategist mining clustered user \
complaints for SaaS product opportunities. Respond with strict JSON only: \
{\"ideas\": [{\"score\": <0-100>, \"name\": \"...\", \"one_liner\": \"...\", \
\"target_user\": \"...\", \"core_features\": [\"...\"], \"why_now\": \"...\", \
\"pricing_hint\": \"...\", \"rationale\": \"...\", \"representative_post_ids\": [<int>], \
\"pattern_evidence\": \"...\", \"similar_to\": \"...\", \"gaps_filled\": \"...\", \
\"does_not_exist\": \"yes|no|unknown\"}]}. Emit 1-3 meaningfully distinct ideas. Prefer \
patterns that are both frequent (3+ posts) and high-scoring (60+). Every idea must address \
the cluster's theme, cite real post ids from the excerpts, and avoid the listed existing \
ideas.";

/// Truncation length for post excerpts in the prompt.
const EXCERPT_CHARS: usize = 500;

/// Aggregate signals over one cluster, rendered into the prompt.
#[derive(Debug, Clone, Default)]
pub struct ClusterInsights {
    /// Mean saas score over scored members.
    pub avg_saas_score: Option<f64>,
    /// Max saas score over scored members.
    pub max_saas_score: Option<f64>,
    /// Members scoring 60 or above.
    pub high_score_count: usize,
    /// Pain points appearing in at least two posts, most frequent first,
    /// capped at five.
    pub top_pain_points: Vec<(String, usize)>,
    /// Top three opportunity types by member count.
    pub type_distribution: Vec<(OpportunityType, usize)>,
    /// Members carrying structured data (a score or pain points).
    pub structured_count: usize,
}

/// Compute the insights block for one cluster.
pub fn compute_insights(cluster: &Cluster) -> ClusterInsights {
    let mut insights = ClusterInsights::default();

    let scored: Vec<f64> = cluster
        .posts
        .iter()
        .filter_map(|p| p.post.saas_score)
        .collect();
    if !scored.is_empty() {
        insights.avg_saas_score = Some(scored.iter().sum::<f64>() / scored.len() as f64);
        insights.max_saas_score = scored.iter().copied().fold(None, |max, v| {
            Some(max.map_or(v, |m: f64| m.max(v)))
        });
        insights.high_score_count = scored.iter().filter(|s| **s >= 60.0).count();
    }

    let mut pain_counts: HashMap<String, usize> = HashMap::new();
    for opp in &cluster.posts {
        if let Some(points) = &opp.post.pain_points {
            // Count each pain point once per post.
            let mut seen = std::collections::HashSet::new();
            for point in points {
                let key = point.trim().to_lowercase();
                if !key.is_empty() && seen.insert(key.clone()) {
                    *pain_counts.entry(key).or_insert(0) += 1;
                }
            }
        }
    }
    let mut pains: Vec<(String, usize)> = pain_counts
        .into_iter()
        .filter(|(_, count)| *count >= 2)
        .collect();
    pains.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    pains.truncate(5);
    insights.top_pain_points = pains;

    let mut type_counts: HashMap<OpportunityType, usize> = HashMap::new();
    for opp in &cluster.posts {
        *type_counts.entry(opp.opportunity_type).or_insert(0) += 1;
    }
    let mut types: Vec<(OpportunityType, usize)> = type_counts.into_iter().collect();
    types.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.as_str().cmp(b.0.as_str())));
    types.truncate(3);
    insights.type_distribution = types;

    insights.structured_count = cluster
        .posts
        .iter()
        .filter(|p| p.post.saas_score.is_some() || p.post.pain_points.is_some())
        .count();

    insights
}

fn render_insights(insights: &ClusterInsights) -> String {
    let mut block = String::from("Cluster insights:\n");
    if let (Some(avg), Some(max)) = (insights.avg_saas_score, insights.max_saas_score) {
        block.push_str(&format!(
            "- SaaS score: avg {avg:.0}, max {max:.0}, {} posts at 60+\n",
            insights.high_score_count
        ));
    }
    if !insights.top_pain_points.is_empty() {
        let rendered: Vec<String> = insights
            .top_pain_points
            .iter()
            .map(|(pain, count)| format!("{pain} (x{count})"))
            .collect();
        block.push_str(&format!("- Recurring pain points: {}\n", rendered.join(", ")));
    }
    if !insights.type_distribution.is_empty() {
        let rendered: Vec<String> = insights
            .type_distribution
            .iter()
            .map(|(t, count)| format!("{} (x{count})", t.as_str()))
            .collect();
        block.push_str(&format!("- Opportunity types: {}\n", rendered.join(", ")));
    }
    block.push_str(&format!(
        "- {} posts carry structured data\n",
        insights.structured_count
    ));
    block
}

/// Build the user prompt for one cluster.
pub fn ideation_prompt(
    cluster: &Cluster,
    insights: &ClusterInsights,
    existing: &[(String, String)],
) -> String {
    let mut prompt = String::with_capacity(16 * 1024);
    prompt.push_str(&format!(
        "Cluster theme: {}\nCluster size: {} posts\n\n",
        cluster.theme_summary, cluster.size
    ));
    prompt.push_str(&render_insights(insights));

    prompt.push_str("\nPost excerpts:\n");
    for opp in cluster.representatives(MAX_REPRESENTATIVE_POSTS) {
        let text: String = format!("{} - {}", opp.post.title, opp.post.body)
            .chars()
            .take(EXCERPT_CHARS)
            .collect();
        let mut meta = Vec::new();
        if let Some(score) = opp.post.saas_score {
            meta.push(format!("SaaS Score {score:.0}"));
        }
        if let Some(points) = &opp.post.pain_points {
            if !points.is_empty() {
                meta.push(format!("Pain Points: {}", points.join("; ")));
            }
        }
        meta.push(format!("Type: {}", opp.opportunity_type.as_str()));
        prompt.push_str(&format!(
            "[post {}] {text} [{}]\n",
            opp.post.id,
            meta.join(" | ")
        ));
    }

    if !existing.is_empty() {
        prompt.push_str("\nExisting ideas to avoid duplicating:\n");
        for (name, target_user) in existing.iter().take(MAX_EXISTING_IDEAS) {
            prompt.push_str(&format!("- {name} (for {target_user})\n"));
        }
    }

    prompt
}

/// Token budget by model: smaller models get the smaller budget.
fn ideation_max_tokens(model: &str) -> u32 {
    if model.contains("mini") || model.contains("3.5") || model.contains("8b") {
        2000
    } else {
        3000
    }
}

/// Coerce one raw idea object into an [`Idea`] tied to its cluster.
fn parse_idea(raw: &Value, cluster: &Cluster) -> Idea {
    let name = parse::string_field(raw, "name");
    let score = parse::score_field(raw, "score");

    // Only ids that are actual members of the generating cluster survive.
    let member_ids: std::collections::HashSet<i64> = cluster.post_ids().into_iter().collect();
    let representative_post_ids: Vec<i64> = parse::int_list_field(raw, "representative_post_ids")
        .into_iter()
        .filter(|id| member_ids.contains(id))
        .collect();

    Idea {
        name_norm: name_norm(&name),
        name,
        score,
        one_liner: parse::string_field(raw, "one_liner"),
        target_user: parse::string_field(raw, "target_user"),
        core_features: parse::string_list_field(raw, "core_features"),
        why_now: parse::string_field(raw, "why_now"),
        pricing_hint: parse::string_field(raw, "pricing_hint"),
        rationale: parse::string_field(raw, "rationale"),
        representative_post_ids,
        pattern_evidence: parse::string_field(raw, "pattern_evidence"),
        similar_to: parse::string_field(raw, "similar_to"),
        gaps_filled: parse::string_field(raw, "gaps_filled"),
        does_not_exist: Existence::parse(&parse::string_field(raw, "does_not_exist")),
        cluster_id: cluster.cluster_id.clone(),
        cluster_theme: cluster.theme_summary.clone(),
        cluster_size: cluster.size,
        automation_category: None,
        automation_signals: vec![],
        original_score: score,
        automation_boost: 0.0,
        validation: None,
        raw: raw.clone(),
    }
}

/// Generate ideas for one cluster.
///
/// Returns the parsed, boosted, threshold-filtered ideas. LLM failures
/// propagate so the orchestrator can decide between skip-and-continue
/// (transient) and partial completion (daily exhaustion).
pub async fn generate_for_cluster(
    llm: &Arc<LlmClient>,
    cluster: &Cluster,
    existing: &[(String, String)],
    enable_automation_boost: bool,
) -> Result<Vec<Idea>, LlmError> {
    let insights = compute_insights(cluster);
    let prompt = ideation_prompt(cluster, &insights, existing);
    let max_tokens = ideation_max_tokens(llm.model_for(CallType::Ideation));

    let value = llm
        .complete(CallType::Ideation, IDEATION_SYSTEM_PROMPT, &prompt, max_tokens, 0.4)
        .await?;

    let raw_ideas = match value.get("ideas") {
        Some(Value::Array(items)) => items.clone(),
        _ => Vec::new(),
    };

    let mut ideas = Vec::with_capacity(raw_ideas.len());
    for raw in &raw_ideas {
        let mut idea = parse_idea(raw, cluster);
        if idea.name.is_empty() {
            tracing::warn!(cluster = %cluster.cluster_id, "dropping nameless idea");
            continue;
        }

        if enable_automation_boost {
            let boost = automation::analyze(&idea, &cluster.theme_summary);
            idea.automation_boost = boost.score_boost;
            idea.automation_category = boost.category.map(str::to_string);
            idea.automation_signals = boost.signals;
            idea.score = (idea.original_score + boost.score_boost).clamp(0.0, 100.0);
        }

        if idea.score < MIN_SCORE_THRESHOLD {
            tracing::debug!(
                cluster = %cluster.cluster_id,
                name = %idea.name,
                score = idea.score,
                "dropping idea below score threshold"
            );
            continue;
        }

        ideas.push(idea);
    }

    Ok(ideas)
}

//! Second-pass market validation of high-scoring ideas.
//!
//! A stronger model re-scores each selected idea and attaches market
//! analysis. The pass is optional, budget-gated, and failure-tolerant: a
//! failed call leaves the original idea untouched.

use std::sync::Arc;

use serde_json::Value;

use crate::cost::CallType;
use crate::idea::{Idea, ValidationOutcome};
use crate::llm::client::LlmClient;
use crate::pipeline::{parse, Pacing, VALIDATION_CALL_ESTIMATE_USD};
use crate::store::now_iso;

const VALIDATION_SYSTEM_PROMPT: &str = "You are a market analyst evaluating SaaS product \
ideas mined from clustered user complaints. Respond with strict JSON only: \
{\"ideas_analysis\": [{\"revised_score\": <0-100>, \"market_size\": \"...\", \
\"competition\": [\"...\"], \"does_exist\": \"...\", \"review_sentiment\": \
{\"positive\": [\"...\"], \"negative\": [\"...\"]}, \"improvement_opportunities\": [\"...\"], \
\"differentiation\": \"...\", \"feasibility\": \"...\", \"risks\": [\"...\"], \
\"go_to_market_hint\": \"...\", \"sanity_check\": \"...\", \"market_validation\": \
{\"financial_impact\": \"...\", \"time_waste_quantified\": \"...\", \
\"business_systems_mentioned\": [\"...\"], \"willingness_to_pay\": \"...\", \
\"pain_frequency\": \"...\", \"target_persona_validated\": \"...\", \
\"market_maturity\": \"...\", \"adoption_barriers\": [\"...\"]}}]}. Be skeptical: revise \
the score down when the market is crowded or the pain is infrequent.";

fn validation_prompt(idea: &Idea) -> String {
    format!(
        "Evaluate this product idea for market viability.\n\n\
         Name: {}\nPitch: {}\nTarget user: {}\nCore features: {}\n\
         Why now: {}\nCurrent score: {:.0}\n\
         Cluster evidence: {} related posts about \"{}\"\nPattern: {}\n",
        idea.name,
        idea.one_liner,
        idea.target_user,
        idea.core_features.join("; "),
        idea.why_now,
        idea.score,
        idea.cluster_size,
        idea.cluster_theme,
        idea.pattern_evidence,
    )
}

fn apply_analysis(idea: &mut Idea, analysis: &Value, model: &str) {
    let review = analysis.get("review_sentiment").cloned().unwrap_or(Value::Null);

    let outcome = ValidationOutcome {
        market_size: parse::string_field(analysis, "market_size"),
        competition: parse::string_list_field(analysis, "competition"),
        does_exist: parse::string_field(analysis, "does_exist"),
        review_positive: parse::string_list_field(&review, "positive"),
        review_negative: parse::string_list_field(&review, "negative"),
        improvement_opportunities: parse::string_list_field(analysis, "improvement_opportunities"),
        differentiation: parse::string_field(analysis, "differentiation"),
        feasibility: parse::string_field(analysis, "feasibility"),
        risks: parse::string_list_field(analysis, "risks"),
        go_to_market_hint: parse::string_field(analysis, "go_to_market_hint"),
        sanity_check: parse::string_field(analysis, "sanity_check"),
        market_validation: analysis.get("market_validation").cloned().unwrap_or(Value::Null),
        validated_at: now_iso(),
        validated_by_model: model.to_string(),
    };

    idea.score = parse::score_field(analysis, "revised_score");
    idea.validation = Some(outcome);
}

/// Validate the top ideas in place. Returns how many were validated.
///
/// Selection: ideas scoring at or above `validation_threshold`, highest
/// first, capped at `max_validation_ideas`, further reduced to what the
/// remaining budget allows at ~[`VALIDATION_CALL_ESTIMATE_USD`] per call.
pub async fn validate_top_ideas(
    llm: &Arc<LlmClient>,
    ideas: &mut [Idea],
    validation_threshold: f64,
    max_validation_ideas: usize,
    pacing: &Pacing,
) -> usize {
    let mut candidates: Vec<usize> = ideas
        .iter()
        .enumerate()
        .filter(|(_, idea)| idea.score >= validation_threshold)
        .map(|(index, _)| index)
        .collect();
    candidates.sort_by(|a, b| {
        ideas[*b]
            .score
            .partial_cmp(&ideas[*a].score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    candidates.truncate(max_validation_ideas);

    if candidates.is_empty() {
        return 0;
    }

    // Shrink the batch to what the budget permits.
    let batch_estimate = candidates.len() as f64 * VALIDATION_CALL_ESTIMATE_USD;
    if llm.would_exceed_budget(batch_estimate) {
        let affordable =
            (llm.remaining_budget() / VALIDATION_CALL_ESTIMATE_USD).floor() as usize;
        tracing::warn!(
            requested = candidates.len(),
            affordable,
            "validation batch reduced by cost ceiling"
        );
        candidates.truncate(affordable);
        if candidates.is_empty() {
            return 0;
        }
    }

    let model = llm.model_for(CallType::Validation).to_string();
    let mut validated = 0usize;
    let total = candidates.len();

    for (position, index) in candidates.into_iter().enumerate() {
        if llm.would_exceed_budget(VALIDATION_CALL_ESTIMATE_USD) {
            tracing::warn!("cost ceiling reached, stopping validation early");
            break;
        }

        let prompt = validation_prompt(&ideas[index]);
        match llm
            .complete(CallType::Validation, VALIDATION_SYSTEM_PROMPT, &prompt, 2000, 0.2)
            .await
        {
            Ok(value) => {
                let analysis = value
                    .get("ideas_analysis")
                    .and_then(|a| a.get(0))
                    .cloned();
                match analysis {
                    Some(analysis) if analysis.is_object() => {
                        apply_analysis(&mut ideas[index], &analysis, &model);
                        validated += 1;
                    }
                    _ => {
                        tracing::warn!(
                            name = %ideas[index].name,
                            "validator returned no analysis, keeping original"
                        );
                    }
                }
            }
            Err(e) => {
                tracing::warn!(
                    name = %ideas[index].name,
                    error = %e,
                    "validation call failed, keeping original"
                );
            }
        }

        if position + 1 < total {
            tokio::time::sleep(pacing.validation_delay).await;
        }
    }

    validated
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::idea::{name_norm, Existence};
    use crate::llm::client::tests::{fast_options, ScriptedProvider};
    use serde_json::json;

    fn idea(name: &str, score: f64) -> Idea {
        Idea {
            name: name.to_string(),
            name_norm: name_norm(name),
            score,
            one_liner: "pitch".to_string(),
            target_user: "ops".to_string(),
            core_features: vec!["a".to_string()],
            why_now: String::new(),
            pricing_hint: String::new(),
            rationale: String::new(),
            representative_post_ids: vec![],
            pattern_evidence: String::new(),
            similar_to: String::new(),
            gaps_filled: String::new(),
            does_not_exist: Existence::Unknown,
            cluster_id: "cluster-1".to_string(),
            cluster_theme: "theme".to_string(),
            cluster_size: 3,
            automation_category: None,
            automation_signals: vec![],
            original_score: score,
            automation_boost: 0.0,
            validation: None,
            raw: serde_json::Value::Null,
        }
    }

    fn analysis_response(revised: f64) -> String {
        json!({
            "ideas_analysis": [{
                "revised_score": revised,
                "market_size": "mid-market",
                "competition": ["ToolA", "ToolB"],
                "does_exist": "partially",
                "review_sentiment": {"positive": ["fast"], "negative": ["pricey"]},
                "improvement_opportunities": ["better onboarding"],
                "differentiation": "deeper integrations",
                "feasibility": "high",
                "risks": ["platform dependency"],
                "go_to_market_hint": "bottom-up",
                "sanity_check": "score justified",
                "market_validation": {"willingness_to_pay": "stated"}
            }]
        })
        .to_string()
    }

    #[tokio::test]
    async fn validates_top_ideas_and_revises_scores() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            ScriptedProvider::ok(&analysis_response(82.0)),
            ScriptedProvider::ok(&analysis_response(64.0)),
        ]));
        let llm = Arc::new(LlmClient::new(provider, fast_options()));

        let mut ideas = vec![idea("Low", 50.0), idea("High", 90.0), idea("Mid", 75.0)];
        let validated =
            validate_top_ideas(&llm, &mut ideas, 70.0, 10, &Pacing::immediate()).await;

        assert_eq!(validated, 2);
        // "High" was validated first (descending), got 82.
        assert!((ideas[1].score - 82.0).abs() < f64::EPSILON);
        assert!((ideas[2].score - 64.0).abs() < f64::EPSILON);
        // "Low" was never selected.
        assert!(ideas[0].validation.is_none());

        let outcome = ideas[1].validation.as_ref().expect("validation");
        assert_eq!(outcome.competition, vec!["ToolA", "ToolB"]);
        assert_eq!(outcome.review_negative, vec!["pricey"]);
        assert_eq!(outcome.validated_by_model, "validator");
        assert!(!outcome.validated_at.is_empty());
    }

    #[tokio::test]
    async fn cap_limits_validator_calls() {
        let provider = Arc::new(ScriptedProvider::new(vec![ScriptedProvider::ok(
            &analysis_response(88.0),
        )]));
        let llm = Arc::new(LlmClient::new(provider.clone(), fast_options()));

        let mut ideas = vec![idea("A", 95.0), idea("B", 90.0), idea("C", 85.0)];
        let validated = validate_top_ideas(&llm, &mut ideas, 70.0, 1, &Pacing::immediate()).await;

        assert_eq!(validated, 1);
        assert_eq!(provider.calls.lock().expect("lock").len(), 1);
    }

    #[tokio::test]
    async fn failed_call_keeps_original_idea() {
        // Empty script: the call fails after retries.
        let provider = Arc::new(ScriptedProvider::new(vec![]));
        let llm = Arc::new(LlmClient::new(provider, fast_options()));

        let mut ideas = vec![idea("High", 90.0)];
        let validated =
            validate_top_ideas(&llm, &mut ideas, 70.0, 10, &Pacing::immediate()).await;

        assert_eq!(validated, 0);
        assert!((ideas[0].score - 90.0).abs() < f64::EPSILON);
        assert!(ideas[0].validation.is_none());
    }

    #[tokio::test]
    async fn budget_shrinks_the_batch() {
        let mut options = fast_options();
        // Room for exactly one ~$0.05 call.
        options.cost_limit_usd = 0.06;
        let provider = Arc::new(ScriptedProvider::new(vec![ScriptedProvider::ok(
            &analysis_response(80.0),
        )]));
        let llm = Arc::new(LlmClient::new(provider.clone(), options));

        let mut ideas = vec![idea("A", 95.0), idea("B", 90.0)];
        let validated =
            validate_top_ideas(&llm, &mut ideas, 70.0, 10, &Pacing::immediate()).await;

        assert_eq!(validated, 1);
        assert_eq!(provider.calls.lock().expect("lock").len(), 1);
    }

    #[tokio::test]
    async fn nothing_above_threshold_is_a_noop() {
        let provider = Arc::new(ScriptedProvider::new(vec![]));
        let llm = Arc::new(LlmClient::new(provider.clone(), fast_options()));

        let mut ideas = vec![idea("A", 40.0)];
        let validated =
            validate_top_ideas(&llm, &mut ideas, 70.0, 10, &Pacing::immediate()).await;
        assert_eq!(validated, 0);
        assert!(provider.calls.lock().expect("lock").is_empty());
    }
}

//! The product-idea record produced by the generation stage.
//!
//! Ideas are built from untyped LLM JSON by the coercing parser, adjusted
//! by the workflow-automation analyzer, optionally enriched by the
//! validation pass, and persisted with the raw payload kept alongside the
//! typed columns.

use serde::{Deserialize, Serialize};

/// Tri-valued judgement on whether a product like this already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Existence {
    /// The model believes nothing like this exists.
    Yes,
    /// Something like this already exists.
    No,
    /// The model could not tell.
    #[default]
    Unknown,
}

impl Existence {
    /// Canonical lowercase form for persistence.
    pub fn as_str(self) -> &'static str {
        match self {
            Existence::Yes => "yes",
            Existence::No => "no",
            Existence::Unknown => "unknown",
        }
    }

    /// Parse a model-provided value, defaulting to `Unknown` for prose.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "yes" | "true" => Existence::Yes,
            "no" | "false" => Existence::No,
            _ => Existence::Unknown,
        }
    }
}

/// Market-validation fields attached by the second-pass LLM evaluation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationOutcome {
    /// Estimated market size description.
    pub market_size: String,
    /// Known competitors.
    pub competition: Vec<String>,
    /// Whether a comparable product exists.
    pub does_exist: String,
    /// Positive review themes of comparable products.
    pub review_positive: Vec<String>,
    /// Negative review themes of comparable products.
    pub review_negative: Vec<String>,
    /// Concrete improvement openings over the competition.
    pub improvement_opportunities: Vec<String>,
    /// How this idea differentiates.
    pub differentiation: String,
    /// Build feasibility assessment.
    pub feasibility: String,
    /// Key risks.
    pub risks: Vec<String>,
    /// Suggested go-to-market motion.
    pub go_to_market_hint: String,
    /// The model's own sanity check on the revised score.
    pub sanity_check: String,
    /// Raw market-validation sub-object as returned by the model.
    pub market_validation: serde_json::Value,
    /// ISO-8601 timestamp of validation.
    pub validated_at: String,
    /// Model identifier that produced the validation.
    pub validated_by_model: String,
}

/// A generated product concept tied to one cluster and one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Idea {
    /// Product name as returned by the model.
    pub name: String,
    /// Normalized dedup key; see [`name_norm`].
    pub name_norm: String,
    /// Current score in `0..=100` (post-boost, post-validation).
    pub score: f64,
    /// One-sentence pitch.
    pub one_liner: String,
    /// Who the product is for.
    pub target_user: String,
    /// Core feature list.
    pub core_features: Vec<String>,
    /// Why this is timely.
    pub why_now: String,
    /// Pricing suggestion.
    pub pricing_hint: String,
    /// Why the model scored it as it did.
    pub rationale: String,
    /// Post ids from the generating cluster cited as evidence.
    pub representative_post_ids: Vec<i64>,
    /// The complaint pattern the idea addresses.
    pub pattern_evidence: String,
    /// Existing products the idea resembles.
    pub similar_to: String,
    /// Gaps in those products the idea fills.
    pub gaps_filled: String,
    /// Whether the model thinks nothing like this exists.
    pub does_not_exist: Existence,
    /// Identifier of the generating cluster.
    pub cluster_id: String,
    /// Theme sentence of the generating cluster.
    pub cluster_theme: String,
    /// Member count of the generating cluster.
    pub cluster_size: usize,
    /// Category assigned by the workflow-automation analyzer.
    pub automation_category: Option<String>,
    /// Signals the analyzer matched.
    pub automation_signals: Vec<String>,
    /// Score as returned by the model, before any boost.
    pub original_score: f64,
    /// Boost applied by the analyzer.
    pub automation_boost: f64,
    /// Second-pass validation outcome, when the validator ran.
    pub validation: Option<ValidationOutcome>,
    /// Raw idea object as returned by the model, for forensic replay.
    pub raw: serde_json::Value,
}

impl Idea {
    /// Score rounded and clamped for persistence.
    pub fn persisted_score(&self) -> i64 {
        let clamped = self.score.clamp(0.0, 100.0);
        clamped.round() as i64
    }

    /// Confidence bucket derived from the persisted score.
    pub fn confidence_level(&self) -> &'static str {
        match self.persisted_score() {
            80..=100 => "high",
            60..=79 => "medium",
            _ => "low",
        }
    }
}

/// Normalize an idea name into its dedup key: lowercase, with runs of
/// non-alphanumeric characters collapsed to single spaces and trimmed.
///
/// The function is a fixed point: `name_norm(name_norm(s)) == name_norm(s)`.
pub fn name_norm(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut pending_space = false;
    for ch in name.chars() {
        if ch.is_alphanumeric() {
            if pending_space && !out.is_empty() {
                out.push(' ');
            }
            pending_space = false;
            for lower in ch.to_lowercase() {
                out.push(lower);
            }
        } else {
            pending_space = true;
        }
    }
    out
}

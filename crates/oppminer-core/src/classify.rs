//! Opportunity classification.
//!
//! Pure, deterministic labelling of a post as a commercial opportunity.
//! Two modes: posts carrying a pre-computed saas score are gated on the
//! score and typed by keyword, unscored posts go through the heuristic
//! rule set. Safe to run over posts in parallel.

use serde::{Deserialize, Serialize};

use crate::store::posts::Post;

/// Category of commercial opportunity a post represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpportunityType {
    Complaint,
    FeatureRequest,
    DiySolution,
    ToolGap,
    MarketResearch,
    BusinessProcess,
    Frustration,
    WorkflowAutomation,
    IntegrationPlatform,
    ComplianceTool,
    AnalyticsDashboard,
}

impl OpportunityType {
    /// Canonical snake_case form.
    pub fn as_str(self) -> &'static str {
        match self {
            OpportunityType::Complaint => "complaint",
            OpportunityType::FeatureRequest => "feature_request",
            OpportunityType::DiySolution => "diy_solution",
            OpportunityType::ToolGap => "tool_gap",
            OpportunityType::MarketResearch => "market_research",
            OpportunityType::BusinessProcess => "business_process",
            OpportunityType::Frustration => "frustration",
            OpportunityType::WorkflowAutomation => "workflow_automation",
            OpportunityType::IntegrationPlatform => "integration_platform",
            OpportunityType::ComplianceTool => "compliance_tool",
            OpportunityType::AnalyticsDashboard => "analytics_dashboard",
        }
    }
}

/// Result of classifying one post.
#[derive(Debug, Clone)]
pub struct Classification {
    /// Whether the post is a commercial opportunity.
    pub is_opportunity: bool,
    /// The assigned opportunity category.
    pub opportunity_type: OpportunityType,
    /// Evidence strings accumulated by the firing rules.
    pub opportunity_signals: Vec<String>,
}

/// A post together with its classification, as flowed through the
/// clustering and generation stages. Derived in-memory per job.
#[derive(Debug, Clone)]
pub struct OpportunityPost {
    pub post: Post,
    pub opportunity_type: OpportunityType,
    pub opportunity_signals: Vec<String>,
}

const WISHLIST_PHRASES: &[&str] = &[
    "wish there was",
    "wish there were",
    "looking for",
    "need a tool",
    "need an app",
    "is there a tool",
    "is there an app",
    "if only there was",
    "would love a tool",
    "any recommendations for",
];

const DIY_PHRASES: &[&str] = &[
    "i built",
    "i created",
    "i made",
    "i wrote a",
    "my script",
    "my own tool",
    "i automated",
    "hacked together",
];

const GAP_PHRASES: &[&str] = &[
    "no tool",
    "nothing exists",
    "doesn't exist",
    "does not exist",
    "can't find",
    "cannot find",
    "couldn't find",
    "there's no",
    "there is no",
];

const RESEARCH_PHRASES: &[&str] = &[
    "would you pay",
    "would anyone use",
    "would anyone pay",
    "is there a market",
    "anyone else need",
    "validate this idea",
];

const BUSINESS_TERMS: &[&str] = &[
    "workflow",
    "process",
    "automation",
    "integration",
    "crm",
    "erp",
    "invoice",
    "onboarding",
    "compliance",
    "reporting",
    "spreadsheet",
];

const FRUSTRATION_WORDS: &[&str] = &[
    "hate",
    "awful",
    "broken",
    "terrible",
    "frustrating",
    "infuriating",
    "nightmare",
    "useless",
    "unusable",
];

/// Classify a post.
///
/// `min_saas_score` gates the scored path; `complaint_sentiment_threshold`
/// tunes the heuristic complaint rule (a complaint fires when
/// `sentiment < threshold`).
pub fn classify(
    post: &Post,
    min_saas_score: f64,
    complaint_sentiment_threshold: f64,
) -> Classification {
    let mut haystack = format!("{} {}", post.title, post.body).to_lowercase();
    if let Some(points) = &post.pain_points {
        for point in points {
            haystack.push(' ');
            haystack.push_str(&point.to_lowercase());
        }
    }

    match post.saas_score {
        Some(score) => classify_scored(post, &haystack, score, min_saas_score),
        None => classify_heuristic(post, &haystack, complaint_sentiment_threshold),
    }
}

/// Database-scored path: opportunity iff the score clears the bar; the
/// type comes from the first matching keyword group.
fn classify_scored(
    post: &Post,
    haystack: &str,
    score: f64,
    min_saas_score: f64,
) -> Classification {
    let contains_any = |terms: &[&str]| terms.iter().any(|t| haystack.contains(t));

    let opportunity_type = if contains_any(&["automation", "workflow", "manual", "repetitive", "process"]) {
        OpportunityType::WorkflowAutomation
    } else if contains_any(&["integration", "connect", "sync", "api", "data flow"]) {
        OpportunityType::IntegrationPlatform
    } else if contains_any(&["compliance", "security", "audit", "regulation"]) {
        OpportunityType::ComplianceTool
    } else if contains_any(&["analytics", "reporting", "dashboard", "metrics", "tracking"]) {
        OpportunityType::AnalyticsDashboard
    } else if post.is_complaint {
        OpportunityType::Complaint
    } else {
        OpportunityType::FeatureRequest
    };

    Classification {
        is_opportunity: score >= min_saas_score,
        opportunity_type,
        opportunity_signals: post.pain_points.clone().unwrap_or_default(),
    }
}

/// Heuristic path for unscored posts. Rules run in order; every firing
/// rule appends its signal, the first firing typed rule captures the
/// type, and the complaint rule acts as the type of last resort.
fn classify_heuristic(
    post: &Post,
    haystack: &str,
    complaint_sentiment_threshold: f64,
) -> Classification {
    let contains_any = |terms: &[&str]| terms.iter().any(|t| haystack.contains(t));

    let mut is_opportunity = false;
    let mut captured_type: Option<OpportunityType> = None;
    let mut signals = Vec::new();
    let mut complaint_fired = false;

    if post.is_complaint && post.sentiment < complaint_sentiment_threshold {
        is_opportunity = true;
        complaint_fired = true;
        signals.push("Negative sentiment complaint".to_string());
    }

    let fire = |cond: bool,
                    opportunity_type: OpportunityType,
                    signal: &str,
                    is_opp: &mut bool,
                    captured: &mut Option<OpportunityType>,
                    signals: &mut Vec<String>| {
        if cond {
            *is_opp = true;
            if captured.is_none() {
                *captured = Some(opportunity_type);
            }
            signals.push(signal.to_string());
        }
    };

    fire(
        contains_any(WISHLIST_PHRASES),
        OpportunityType::FeatureRequest,
        "Explicit tool wish",
        &mut is_opportunity,
        &mut captured_type,
        &mut signals,
    );
    fire(
        contains_any(DIY_PHRASES),
        OpportunityType::DiySolution,
        "Self-built workaround",
        &mut is_opportunity,
        &mut captured_type,
        &mut signals,
    );
    fire(
        contains_any(GAP_PHRASES) && post.sentiment > -0.5,
        OpportunityType::ToolGap,
        "Missing tool mentioned",
        &mut is_opportunity,
        &mut captured_type,
        &mut signals,
    );
    fire(
        contains_any(RESEARCH_PHRASES),
        OpportunityType::MarketResearch,
        "Market validation question",
        &mut is_opportunity,
        &mut captured_type,
        &mut signals,
    );

    let business_hits = BUSINESS_TERMS
        .iter()
        .filter(|t| haystack.contains(*t))
        .count();
    fire(
        business_hits >= 2,
        OpportunityType::BusinessProcess,
        "Business process vocabulary",
        &mut is_opportunity,
        &mut captured_type,
        &mut signals,
    );
    fire(
        contains_any(FRUSTRATION_WORDS),
        OpportunityType::Frustration,
        "Strong frustration language",
        &mut is_opportunity,
        &mut captured_type,
        &mut signals,
    );

    let opportunity_type = captured_type.unwrap_or(if complaint_fired || post.is_complaint {
        OpportunityType::Complaint
    } else {
        OpportunityType::FeatureRequest
    });

    Classification {
        is_opportunity,
        opportunity_type,
        opportunity_signals: signals,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post(title: &str, body: &str) -> Post {
        Post {
            id: 1,
            platform: "reddit".to_string(),
            created_at: "2026-07-01T00:00:00Z".to_string(),
            title: title.to_string(),
            body: body.to_string(),
            sentiment: 0.0,
            is_complaint: false,
            saas_score: None,
            pain_points: None,
            similarity_scores: None,
            embedding: None,
        }
    }

    #[test]
    fn scored_post_gated_on_min_score() {
        let mut p = post("boring", "nothing here");
        p.saas_score = Some(25.0);
        assert!(!classify(&p, 30.0, 0.0).is_opportunity);

        p.saas_score = Some(30.0);
        assert!(classify(&p, 30.0, 0.0).is_opportunity);
    }

    #[test]
    fn scored_post_keyword_typing_order() {
        let mut p = post("manual workflow pain", "so much repetitive work");
        p.saas_score = Some(80.0);
        let c = classify(&p, 30.0, 0.0);
        assert_eq!(c.opportunity_type, OpportunityType::WorkflowAutomation);

        let mut p = post("need an integration", "connect two systems via api");
        p.saas_score = Some(80.0);
        let c = classify(&p, 30.0, 0.0);
        assert_eq!(c.opportunity_type, OpportunityType::IntegrationPlatform);

        let mut p = post("audit season", "compliance burden is heavy");
        p.saas_score = Some(80.0);
        let c = classify(&p, 30.0, 0.0);
        assert_eq!(c.opportunity_type, OpportunityType::ComplianceTool);

        let mut p = post("better dashboard", "reporting metrics everywhere");
        p.saas_score = Some(80.0);
        let c = classify(&p, 30.0, 0.0);
        assert_eq!(c.opportunity_type, OpportunityType::AnalyticsDashboard);
    }

    #[test]
    fn scored_post_falls_back_to_complaint_flag() {
        let mut p = post("meh", "just a gripe with no keywords");
        p.saas_score = Some(50.0);
        p.is_complaint = true;
        assert_eq!(
            classify(&p, 30.0, 0.0).opportunity_type,
            OpportunityType::Complaint
        );

        p.is_complaint = false;
        assert_eq!(
            classify(&p, 30.0, 0.0).opportunity_type,
            OpportunityType::FeatureRequest
        );
    }

    #[test]
    fn scored_post_signals_come_from_pain_points() {
        let mut p = post("manual workflow", "ugh");
        p.saas_score = Some(60.0);
        p.pain_points = Some(vec!["double data entry".to_string()]);
        let c = classify(&p, 30.0, 0.0);
        assert_eq!(c.opportunity_signals, vec!["double data entry".to_string()]);
    }

    // The wishlist phrase captures the type before the DIY rule even
    // though the post is also a negative-sentiment complaint.
    #[test]
    fn heuristic_wishlist_wins_type_over_diy() {
        let mut p = post(
            "wish there was a better CRM→email sync",
            "i built a script but it breaks",
        );
        p.sentiment = -0.2;
        p.is_complaint = true;

        let c = classify(&p, 30.0, 0.0);
        assert!(c.is_opportunity);
        assert_eq!(c.opportunity_type, OpportunityType::FeatureRequest);
        assert!(c
            .opportunity_signals
            .contains(&"Explicit tool wish".to_string()));
        assert!(c
            .opportunity_signals
            .contains(&"Self-built workaround".to_string()));
        assert!(c
            .opportunity_signals
            .contains(&"Negative sentiment complaint".to_string()));
    }

    #[test]
    fn heuristic_complaint_alone_types_as_complaint() {
        let mut p = post("this vendor", "slow and painful to deal with");
        p.sentiment = -0.6;
        p.is_complaint = true;

        let c = classify(&p, 30.0, 0.0);
        assert!(c.is_opportunity);
        assert_eq!(c.opportunity_type, OpportunityType::Complaint);
    }

    #[test]
    fn heuristic_complaint_threshold_is_tunable() {
        let mut p = post("this vendor", "slow and painful to deal with");
        p.sentiment = -0.05;
        p.is_complaint = true;

        assert!(classify(&p, 30.0, 0.0).is_opportunity);
        // With a stricter threshold the mild complaint no longer fires.
        assert!(!classify(&p, 30.0, -0.1).is_opportunity);
    }

    #[test]
    fn heuristic_tool_gap_requires_mild_sentiment() {
        let mut p = post("searching", "can't find anything that does this");
        p.sentiment = -0.2;
        let c = classify(&p, 30.0, 0.0);
        assert_eq!(c.opportunity_type, OpportunityType::ToolGap);

        p.sentiment = -0.8;
        let c = classify(&p, 30.0, 0.0);
        assert_ne!(c.opportunity_type, OpportunityType::ToolGap);
    }

    #[test]
    fn heuristic_business_process_needs_two_terms() {
        let p = post("question", "our workflow needs automation badly");
        let c = classify(&p, 30.0, 0.0);
        assert!(c.is_opportunity);
        assert_eq!(c.opportunity_type, OpportunityType::BusinessProcess);

        let p = post("question", "our workflow is fine");
        let c = classify(&p, 30.0, 0.0);
        assert!(!c.is_opportunity);
    }

    #[test]
    fn heuristic_frustration_words() {
        let p = post("rant", "this tool is awful and broken");
        let c = classify(&p, 30.0, 0.0);
        assert!(c.is_opportunity);
        assert_eq!(c.opportunity_type, OpportunityType::Frustration);
    }

    #[test]
    fn heuristic_nothing_fires() {
        let p = post("sunset photos", "what a lovely evening");
        let c = classify(&p, 30.0, 0.0);
        assert!(!c.is_opportunity);
        assert!(c.opportunity_signals.is_empty());
    }

    #[test]
    fn classifier_is_deterministic() {
        let mut p = post("wish there was a tool", "i built my script");
        p.sentiment = -0.2;
        p.is_complaint = true;
        let a = classify(&p, 30.0, 0.0);
        let b = classify(&p, 30.0, 0.0);
        assert_eq!(a.is_opportunity, b.is_opportunity);
        assert_eq!(a.opportunity_type, b.opportunity_type);
        assert_eq!(a.opportunity_signals, b.opportunity_signals);
    }
}

//! Workflow-automation scoring adjuster.
//!
//! Pure keyword pass over a generated idea's text. Business-automation
//! patterns monetize better than generic consumer complaints, so matching
//! ideas get a score boost and a category label. Four independent signal
//! groups accumulate; the process-optimization group only fires when
//! nothing else did.

use crate::idea::Idea;

const WORKFLOW_TERMS: &[&str] = &[
    "automat",
    "workflow",
    "manual",
    "repetitive",
    "recurring",
    "scheduled",
    "trigger",
    "batch process",
    "bulk",
    "routine",
    "streamline",
    "eliminate manual",
];

const INTEGRATION_VERBS: &[&str] = &["integrat", "connect", "sync", "bridge", "link"];

const SYSTEM_NAMES: &[&str] = &[
    "crm",
    "erp",
    "salesforce",
    "slack",
    "teams",
    "jira",
    "asana",
    "hubspot",
    "mailchimp",
    "stripe",
    "quickbooks",
    "excel",
    "spreadsheet",
];

const REPORTING_TERMS: &[&str] = &[
    "report",
    "dashboard",
    "analytic",
    "metric",
    "kpi",
    "visibility",
    "insight",
    "track",
    "monitor",
    "measure",
    "visualiz",
    "chart",
    "graph",
];

const COMPLIANCE_TERMS: &[&str] = &[
    "compliance",
    "audit",
    "regulatory",
    "govern",
    "policy",
    "rule",
    "approval",
    "permission",
    "access control",
    "security",
    "gdpr",
    "hipaa",
];

const PROCESS_TERMS: &[&str] = &[
    "process",
    "procedure",
    "checklist",
    "template",
    "standardiz",
    "optimize",
];

/// Outcome of the analyzer for one idea.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AutomationBoost {
    /// Total boost to add to the idea's score.
    pub score_boost: f64,
    /// First-fired category, if any group matched.
    pub category: Option<&'static str>,
    /// One entry per fired group.
    pub signals: Vec<String>,
}

impl AutomationBoost {
    fn fire(&mut self, category: &'static str, amount: f64, signal: String) {
        self.score_boost += amount;
        if self.category.is_none() {
            self.category = Some(category);
        }
        self.signals.push(signal);
    }
}

/// Analyze one idea against its cluster theme.
pub fn analyze(idea: &Idea, cluster_theme: &str) -> AutomationBoost {
    let features_json = serde_json::to_string(&idea.core_features).unwrap_or_default();
    let haystack = format!(
        "{} {} {} {} {}",
        idea.name, idea.one_liner, idea.rationale, features_json, cluster_theme
    )
    .to_lowercase();

    let contains_any = |terms: &[&str]| terms.iter().any(|t| haystack.contains(t));

    let mut boost = AutomationBoost::default();

    if contains_any(WORKFLOW_TERMS) {
        boost.fire(
            "workflow_automation",
            15.0,
            "workflow automation keywords".to_string(),
        );
    }

    let system_hits = SYSTEM_NAMES
        .iter()
        .filter(|name| haystack.contains(*name))
        .count();
    if contains_any(INTEGRATION_VERBS) && system_hits >= 2 {
        boost.fire(
            "integration_platform",
            12.0,
            format!("integration verbs with {system_hits} systems"),
        );
    }

    if contains_any(REPORTING_TERMS) {
        boost.fire(
            "reporting_dashboard",
            10.0,
            "reporting and visibility keywords".to_string(),
        );
    }

    if contains_any(COMPLIANCE_TERMS) {
        boost.fire(
            "compliance_automation",
            8.0,
            "compliance and governance keywords".to_string(),
        );
    }

    if boost.signals.is_empty() && contains_any(PROCESS_TERMS) {
        boost.fire(
            "process_optimization",
            5.0,
            "process optimization keywords".to_string(),
        );
    }

    boost
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::idea::{name_norm, Existence};

    fn idea(name: &str, one_liner: &str, rationale: &str, features: &[&str]) -> Idea {
        Idea {
            name: name.to_string(),
            name_norm: name_norm(name),
            score: 60.0,
            one_liner: one_liner.to_string(),
            target_user: String::new(),
            core_features: features.iter().map(|f| (*f).to_string()).collect(),
            why_now: String::new(),
            pricing_hint: String::new(),
            rationale: rationale.to_string(),
            representative_post_ids: vec![],
            pattern_evidence: String::new(),
            similar_to: String::new(),
            gaps_filled: String::new(),
            does_not_exist: Existence::Unknown,
            cluster_id: "cluster-1".to_string(),
            cluster_theme: String::new(),
            cluster_size: 2,
            automation_category: None,
            automation_signals: vec![],
            original_score: 60.0,
            automation_boost: 0.0,
            validation: None,
            raw: serde_json::Value::Null,
        }
    }

    // A CRM-to-Slack automation idea fires both workflow (+15) and
    // integration (+12); category is the first-fired group, and
    // 60 + 27 = 87.
    #[test]
    fn workflow_plus_integration_boost() {
        let idea = idea(
            "Workflow Sync",
            "automate manual CRM to Slack updates",
            "",
            &[
                "workflow trigger",
                "salesforce integration",
                "slack integration",
            ],
        );
        let boost = analyze(&idea, "");

        assert!((boost.score_boost - 27.0).abs() < f64::EPSILON);
        assert_eq!(boost.category, Some("workflow_automation"));
        assert_eq!(boost.signals.len(), 2);
        assert!((idea.score + boost.score_boost - 87.0).abs() < f64::EPSILON);
    }

    #[test]
    fn integration_requires_two_systems() {
        let one_system = idea("Connector", "sync your crm data", "", &[]);
        let boost = analyze(&one_system, "");
        assert!(!boost.signals.iter().any(|s| s.contains("integration")));

        let two_systems = idea("Connector", "sync crm data into excel", "", &[]);
        let boost = analyze(&two_systems, "");
        assert!(boost.signals.iter().any(|s| s.contains("integration")));
    }

    #[test]
    fn reporting_and_compliance_accumulate() {
        let idea = idea(
            "Audit Dashboard",
            "a dashboard that tracks audit readiness",
            "gives compliance teams visibility",
            &[],
        );
        let boost = analyze(&idea, "");
        // reporting (+10) and compliance (+8); no workflow or integration.
        assert!((boost.score_boost - 18.0).abs() < f64::EPSILON);
        assert_eq!(boost.category, Some("reporting_dashboard"));
    }

    #[test]
    fn process_optimization_only_when_nothing_else_fires() {
        let idea_plain = idea("Checklist App", "shared checklists for teams", "", &[]);
        let boost = analyze(&idea_plain, "");
        assert!((boost.score_boost - 5.0).abs() < f64::EPSILON);
        assert_eq!(boost.category, Some("process_optimization"));

        // When workflow fires, the process group stays silent even though
        // "checklist" matches it.
        let idea_both = idea(
            "Checklist App",
            "automate recurring checklists",
            "",
            &[],
        );
        let boost = analyze(&idea_both, "");
        assert!((boost.score_boost - 15.0).abs() < f64::EPSILON);
        assert_eq!(boost.category, Some("workflow_automation"));
    }

    #[test]
    fn cluster_theme_feeds_the_haystack() {
        let bare = idea("Helper", "assists small teams", "", &[]);
        let without_theme = analyze(&bare, "");
        assert!((without_theme.score_boost).abs() < f64::EPSILON);

        let with_theme = analyze(&bare, "complaints about manual invoice entry");
        assert!((with_theme.score_boost - 15.0).abs() < f64::EPSILON);
    }

    #[test]
    fn no_signals_no_boost() {
        let idea = idea("Pet Namer", "names your pet", "fun for families", &[]);
        let boost = analyze(&idea, "");
        assert!((boost.score_boost).abs() < f64::EPSILON);
        assert!(boost.category.is_none());
        assert!(boost.signals.is_empty());
    }
}

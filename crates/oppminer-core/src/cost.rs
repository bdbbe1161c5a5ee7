//! Per-job spend tracking.
//!
//! The ledger is owned by one job's LLM client and mutated in sequence on
//! the orchestrator task. The validator consults it before each call so a
//! configured cost ceiling cannot be overrun by a runaway batch.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Which pipeline stage a call was made for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallType {
    /// Theme naming and idea generation.
    Ideation,
    /// The second-pass market-validation model.
    Validation,
}

impl CallType {
    /// Canonical lowercase form for persistence.
    pub fn as_str(self) -> &'static str {
        match self {
            CallType::Ideation => "ideation",
            CallType::Validation => "validation",
        }
    }
}

/// Aggregated spend for one model.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelSpend {
    pub requests: u64,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cost: f64,
}

/// One completed LLM call, kept for best-effort persistence at job end.
#[derive(Debug, Clone)]
pub struct UsageRecord {
    pub call_type: CallType,
    pub model: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub cost: f64,
}

/// Per-job accumulator of LLM token spend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostLedger {
    /// Total spend across both call types.
    pub total_cost: f64,
    /// Spend tagged `ideation`.
    pub ideation_cost: f64,
    /// Spend tagged `validation`.
    pub validation_cost: f64,
    /// Configured spend ceiling in USD.
    pub limit: f64,
    /// Per-model request and token counts.
    pub models: BTreeMap<String, ModelSpend>,
    /// Per-call log, drained for persistence when the job finishes.
    #[serde(skip)]
    pub calls: Vec<UsageRecord>,
}

impl CostLedger {
    /// Create an empty ledger with the given spend ceiling.
    pub fn new(limit: f64) -> Self {
        CostLedger {
            total_cost: 0.0,
            ideation_cost: 0.0,
            validation_cost: 0.0,
            limit,
            models: BTreeMap::new(),
            calls: Vec::new(),
        }
    }

    /// Record one completed call.
    pub fn record(
        &mut self,
        call_type: CallType,
        model: &str,
        input_tokens: u32,
        output_tokens: u32,
        cost: f64,
    ) {
        self.total_cost += cost;
        match call_type {
            CallType::Ideation => self.ideation_cost += cost,
            CallType::Validation => self.validation_cost += cost,
        }

        let spend = self.models.entry(model.to_string()).or_default();
        spend.requests += 1;
        spend.input_tokens += u64::from(input_tokens);
        spend.output_tokens += u64::from(output_tokens);
        spend.cost += cost;

        self.calls.push(UsageRecord {
            call_type,
            model: model.to_string(),
            input_tokens,
            output_tokens,
            cost,
        });
    }

    /// Remaining budget, floored at zero.
    pub fn remaining(&self) -> f64 {
        (self.limit - self.total_cost).max(0.0)
    }

    /// Whether spending `estimate` more would cross the ceiling.
    pub fn would_exceed(&self, estimate: f64) -> bool {
        self.total_cost + estimate > self.limit
    }

    /// Whether the ceiling has already been crossed.
    pub fn exceeded(&self) -> bool {
        self.total_cost > self.limit
    }
}

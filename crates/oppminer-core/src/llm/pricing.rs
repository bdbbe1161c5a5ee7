//! LLM pricing lookup for cost estimation.
//!
//! Provides per-token pricing for known models and computes estimated
//! costs. Prices are in USD per thousand tokens; unknown and local models
//! default to $0.

/// Per-token pricing for a model.
#[derive(Debug, Clone, Copy)]
pub struct ModelPricing {
    /// USD per thousand input tokens.
    pub input_per_1k: f64,
    /// USD per thousand output tokens.
    pub output_per_1k: f64,
}

impl ModelPricing {
    /// Compute the estimated cost for the given token counts.
    pub fn compute_cost(&self, input_tokens: u32, output_tokens: u32) -> f64 {
        let input_cost = (f64::from(input_tokens) / 1000.0) * self.input_per_1k;
        let output_cost = (f64::from(output_tokens) / 1000.0) * self.output_per_1k;
        input_cost + output_cost
    }
}

/// Look up pricing for a model identifier.
///
/// Matching is by prefix/substring so versioned identifiers resolve to
/// their family. Unknown models are treated as free rather than guessed.
pub fn lookup(model: &str) -> ModelPricing {
    if model.starts_with("gpt-4o-mini") {
        ModelPricing {
            input_per_1k: 0.00015,
            output_per_1k: 0.0006,
        }
    } else if model.starts_with("gpt-4o") {
        ModelPricing {
            input_per_1k: 0.0025,
            output_per_1k: 0.01,
        }
    } else if model.starts_with("gpt-4-turbo") {
        ModelPricing {
            input_per_1k: 0.01,
            output_per_1k: 0.03,
        }
    } else if model.starts_with("gpt-3.5") {
        ModelPricing {
            input_per_1k: 0.0005,
            output_per_1k: 0.0015,
        }
    } else if model.contains("llama-3.1-70b") || model.contains("llama3-70b") {
        ModelPricing {
            input_per_1k: 0.00059,
            output_per_1k: 0.00079,
        }
    } else if model.contains("llama-3.1-8b") || model.contains("llama3-8b") {
        ModelPricing {
            input_per_1k: 0.00005,
            output_per_1k: 0.00008,
        }
    } else {
        ModelPricing {
            input_per_1k: 0.0,
            output_per_1k: 0.0,
        }
    }
}

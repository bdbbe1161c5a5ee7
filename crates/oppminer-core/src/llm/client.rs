//! Retrying LLM client with model fallback, circuit breaking, and cost
//! accounting.
//!
//! One `LlmClient` is constructed per job: the cost ledger and breaker
//! state it owns are job-scoped. The client is `&self`-callable so the
//! theme-naming stage can fan calls out across tasks through an `Arc`.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use rand::Rng;
use serde_json::Value;

use super::breaker::CircuitBreaker;
use super::{estimate_tokens, pricing, ChatProvider, ChatRequest, ChatResponse};
use crate::config::LlmConfig;
use crate::cost::{CallType, CostLedger, UsageRecord};
use crate::error::LlmError;

/// Tuning knobs for the retry loop. Defaults follow the provider's
/// published limits; tests shrink the delays.
#[derive(Debug, Clone)]
pub struct LlmClientOptions {
    /// Model for theme naming and idea generation.
    pub ideation_model: String,
    /// Model tried after a daily-quota exhaustion (or a fully failed
    /// retry budget) on the primary.
    pub fallback_model: Option<String>,
    /// Model for the market-validation pass.
    pub validation_model: String,
    /// Per-job spend ceiling in USD.
    pub cost_limit_usd: f64,
    /// Attempts per model before moving to the fallback.
    pub max_attempts: u32,
    /// Base delay for per-minute rate limits (scaled by attempt).
    pub rate_limit_base_delay: Duration,
    /// Base delay for server/network back-off (doubled per attempt).
    pub server_backoff_base: Duration,
    /// Cap on the server/network back-off.
    pub server_backoff_cap: Duration,
    /// Circuit-breaker cooldown window.
    pub circuit_cooldown: Duration,
    /// Per-call timeout for ideation requests.
    pub ideation_timeout: Duration,
    /// Per-call timeout for validation requests.
    pub validation_timeout: Duration,
}

impl LlmClientOptions {
    /// Build options from configuration, with production pacing defaults.
    pub fn from_config(config: &LlmConfig) -> Self {
        LlmClientOptions {
            ideation_model: config.ideation_model.clone(),
            fallback_model: config.fallback_model.clone(),
            validation_model: config.validation_model.clone(),
            cost_limit_usd: config.cost_limit_usd,
            max_attempts: 5,
            rate_limit_base_delay: Duration::from_secs(60),
            server_backoff_base: Duration::from_secs(2),
            server_backoff_cap: Duration::from_secs(60),
            circuit_cooldown: Duration::from_secs(90),
            ideation_timeout: Duration::from_secs(60),
            validation_timeout: Duration::from_secs(90),
        }
    }
}

/// Job-scoped LLM client.
pub struct LlmClient {
    provider: Arc<dyn ChatProvider>,
    options: LlmClientOptions,
    ledger: Mutex<CostLedger>,
    breaker: Mutex<CircuitBreaker>,
}

impl LlmClient {
    /// Create a client around a transport provider.
    pub fn new(provider: Arc<dyn ChatProvider>, options: LlmClientOptions) -> Self {
        let ledger = CostLedger::new(options.cost_limit_usd);
        let breaker = CircuitBreaker::new(options.circuit_cooldown);
        LlmClient {
            provider,
            options,
            ledger: Mutex::new(ledger),
            breaker: Mutex::new(breaker),
        }
    }

    /// The model a call type resolves to.
    pub fn model_for(&self, call_type: CallType) -> &str {
        match call_type {
            CallType::Ideation => &self.options.ideation_model,
            CallType::Validation => &self.options.validation_model,
        }
    }

    /// Issue one JSON-mode completion, retrying per the rate-limit and
    /// back-off policy and falling back across models.
    ///
    /// Returns the parsed JSON value. While the circuit breaker is open,
    /// short-circuits to an empty object so callers shed load instead of
    /// queueing against a failing provider.
    pub async fn complete(
        &self,
        call_type: CallType,
        system: &str,
        user: &str,
        max_tokens: u32,
        temperature: f32,
    ) -> Result<Value, LlmError> {
        if self.breaker.lock().expect("breaker lock").is_open(Instant::now()) {
            tracing::warn!("circuit breaker open, short-circuiting LLM call");
            return Ok(Value::Object(serde_json::Map::new()));
        }

        let timeout = match call_type {
            CallType::Ideation => self.options.ideation_timeout,
            CallType::Validation => self.options.validation_timeout,
        };

        let chain = self.model_chain(call_type);
        let mut attempts_total = 0u32;
        let mut last_error = String::new();
        let mut last_model_daily_exhausted = false;
        let mut exhausted_model = String::new();

        for model in &chain {
            last_model_daily_exhausted = false;

            for attempt in 1..=self.options.max_attempts {
                attempts_total += 1;

                let request = ChatRequest {
                    model: model.clone(),
                    system: system.to_string(),
                    user: user.to_string(),
                    max_tokens,
                    temperature,
                    json_response: true,
                };

                match self.provider.chat(&request, timeout).await {
                    Ok(response) => {
                        self.account(call_type, model, system, user, &response);
                        match parse_json_with_repair(&response.text) {
                            Ok(value) => {
                                self.breaker.lock().expect("breaker lock").record_success();
                                return Ok(value);
                            }
                            Err(e) => {
                                self.record_failure();
                                last_error = e.to_string();
                                tracing::warn!(
                                    model = %model,
                                    attempt,
                                    error = %last_error,
                                    "LLM returned unparseable JSON"
                                );
                                if attempt < self.options.max_attempts {
                                    tokio::time::sleep(self.server_backoff(attempt)).await;
                                }
                            }
                        }
                    }
                    Err(LlmError::RateLimited {
                        retry_after_secs,
                        daily: false,
                    }) => {
                        self.record_failure();
                        last_error = format!("rate limited (hint: {retry_after_secs:?})");
                        if attempt < self.options.max_attempts {
                            let wait = self.rate_limit_delay(retry_after_secs, attempt);
                            tracing::warn!(
                                model = %model,
                                attempt,
                                wait_secs = wait.as_secs(),
                                "LLM rate limited, backing off"
                            );
                            tokio::time::sleep(wait).await;
                        }
                    }
                    Err(LlmError::RateLimited { daily: true, .. }) => {
                        self.record_failure();
                        last_model_daily_exhausted = true;
                        exhausted_model = model.clone();
                        tracing::warn!(
                            model = %model,
                            "daily request quota exhausted, abandoning model"
                        );
                        break;
                    }
                    Err(e) if e.is_retryable() => {
                        self.record_failure();
                        last_error = e.to_string();
                        tracing::warn!(
                            model = %model,
                            attempt,
                            error = %last_error,
                            "transient LLM failure"
                        );
                        if attempt < self.options.max_attempts {
                            tokio::time::sleep(self.server_backoff(attempt)).await;
                        }
                    }
                    Err(e) => {
                        // Client-side errors (401, 400) will not improve
                        // with retries or a different attempt count.
                        self.record_failure();
                        return Err(e);
                    }
                }
            }
        }

        if last_model_daily_exhausted {
            return Err(LlmError::DailyLimitExceeded {
                model: exhausted_model,
            });
        }
        Err(LlmError::RetriesExhausted {
            attempts: attempts_total,
            last_error,
        })
    }

    /// Snapshot of the ledger for result reporting.
    pub fn ledger(&self) -> CostLedger {
        self.ledger.lock().expect("ledger lock").clone()
    }

    /// Total spend so far.
    pub fn total_cost(&self) -> f64 {
        self.ledger.lock().expect("ledger lock").total_cost
    }

    /// Whether spending `estimate` more would cross the ceiling.
    pub fn would_exceed_budget(&self, estimate: f64) -> bool {
        self.ledger.lock().expect("ledger lock").would_exceed(estimate)
    }

    /// Remaining budget, floored at zero.
    pub fn remaining_budget(&self) -> f64 {
        self.ledger.lock().expect("ledger lock").remaining()
    }

    /// Whether the job has degraded into fallback mode (sustained failure
    /// rate); the orchestrator skips validator calls when set.
    pub fn fallback_mode(&self) -> bool {
        self.breaker.lock().expect("breaker lock").fallback_mode()
    }

    /// Drain the per-call usage log for persistence.
    pub fn drain_usage(&self) -> Vec<UsageRecord> {
        std::mem::take(&mut self.ledger.lock().expect("ledger lock").calls)
    }

    fn model_chain(&self, call_type: CallType) -> Vec<String> {
        let primary = self.model_for(call_type).to_string();
        let mut chain = vec![primary];
        if let Some(fallback) = &self.options.fallback_model {
            if !chain.contains(fallback) {
                chain.push(fallback.clone());
            }
        }
        chain
    }

    fn account(&self, call_type: CallType, model: &str, system: &str, user: &str, response: &ChatResponse) {
        let usage = response.usage.unwrap_or_else(|| super::TokenUsage {
            input_tokens: estimate_tokens(system) + estimate_tokens(user),
            output_tokens: estimate_tokens(&response.text),
        });
        let cost = pricing::lookup(model).compute_cost(usage.input_tokens, usage.output_tokens);
        self.ledger.lock().expect("ledger lock").record(
            call_type,
            model,
            usage.input_tokens,
            usage.output_tokens,
            cost,
        );
    }

    fn record_failure(&self) {
        self.breaker
            .lock()
            .expect("breaker lock")
            .record_failure(Instant::now());
    }

    /// `max(hint + 5s, base × attempt)` per the provider's guidance.
    fn rate_limit_delay(&self, hint_secs: Option<u64>, attempt: u32) -> Duration {
        let scaled = self.options.rate_limit_base_delay * attempt;
        match hint_secs {
            Some(hint) => scaled.max(Duration::from_secs(hint + 5)),
            None => scaled,
        }
    }

    /// `min(base × 2^(attempt−1), cap)` plus a little jitter.
    fn server_backoff(&self, attempt: u32) -> Duration {
        let doubled = self
            .options
            .server_backoff_base
            .saturating_mul(1u32 << (attempt - 1).min(10));
        let capped = doubled.min(self.options.server_backoff_cap);
        let jitter_ms = rand::thread_rng().gen_range(0..250);
        capped + Duration::from_millis(jitter_ms)
    }
}

/// Parse a JSON body; on failure trim trailing incomplete content at the
/// last `}` and retry once.
fn parse_json_with_repair(text: &str) -> Result<Value, LlmError> {
    match serde_json::from_str(text) {
        Ok(value) => Ok(value),
        Err(first) => {
            if let Some(pos) = text.rfind('}') {
                if let Ok(value) = serde_json::from_str::<Value>(&text[..=pos]) {
                    return Ok(value);
                }
            }
            Err(LlmError::MalformedResponse(first.to_string()))
        }
    }
}

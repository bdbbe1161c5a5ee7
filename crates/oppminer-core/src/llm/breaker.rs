//! Circuit breaker for the LLM client.
//!
//! Tracks consecutive failures across one job. After `OPEN_THRESHOLD`
//! consecutive failures the breaker opens and calls short-circuit for the
//! cooldown window, then half-open: the next call goes through, and its
//! outcome either closes or re-opens the breaker. A running failure rate
//! at or above `FALLBACK_RATE` latches `fallback_mode`, which the
//! orchestrator reads to skip validator calls for the rest of the job.

use std::time::{Duration, Instant};

/// Consecutive failures that open the breaker.
const OPEN_THRESHOLD: u32 = 3;

/// Running failure rate that latches fallback mode.
const FALLBACK_RATE: f64 = 0.6;

/// Minimum observations before the failure rate is meaningful.
const FALLBACK_MIN_CALLS: u64 = 5;

/// Per-job circuit breaker state.
#[derive(Debug)]
pub struct CircuitBreaker {
    cooldown: Duration,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    total_calls: u64,
    failed_calls: u64,
    fallback_mode: bool,
}

impl CircuitBreaker {
    /// Create a closed breaker with the given cooldown window.
    pub fn new(cooldown: Duration) -> Self {
        CircuitBreaker {
            cooldown,
            consecutive_failures: 0,
            opened_at: None,
            total_calls: 0,
            failed_calls: 0,
            fallback_mode: false,
        }
    }

    /// Whether calls should short-circuit right now.
    ///
    /// Open within the cooldown window; after it elapses the breaker is
    /// half-open and lets the next call through.
    pub fn is_open(&self, now: Instant) -> bool {
        match self.opened_at {
            Some(opened) => now.duration_since(opened) < self.cooldown,
            None => false,
        }
    }

    /// Record a successful call; closes the breaker.
    pub fn record_success(&mut self) {
        self.total_calls += 1;
        self.consecutive_failures = 0;
        self.opened_at = None;
    }

    /// Record a failed call; may open (or re-open) the breaker.
    pub fn record_failure(&mut self, now: Instant) {
        self.total_calls += 1;
        self.failed_calls += 1;
        self.consecutive_failures += 1;

        if self.consecutive_failures >= OPEN_THRESHOLD {
            self.opened_at = Some(now);
        }

        if self.total_calls >= FALLBACK_MIN_CALLS {
            let rate = self.failed_calls as f64 / self.total_calls as f64;
            if rate >= FALLBACK_RATE {
                self.fallback_mode = true;
            }
        }
    }

    /// Whether the job has degraded into fallback mode. Latched: once
    /// set it stays set for the remainder of the job.
    pub fn fallback_mode(&self) -> bool {
        self.fallback_mode
    }
}

//! LLM client layer.
//!
//! Split into a thin transport ([`ChatProvider`] implemented by
//! [`openai::OpenAiProvider`]) and the retrying [`client::LlmClient`] that
//! owns rate-limit handling, model fallback, the circuit breaker, and the
//! per-job cost ledger.

pub mod breaker;
pub mod client;
pub mod openai;
pub mod pricing;

use std::time::Duration;

use crate::error::LlmError;

/// Token usage information from an LLM completion.
#[derive(Debug, Clone, Copy, Default, serde::Serialize, serde::Deserialize)]
pub struct TokenUsage {
    /// Number of tokens in the input/prompt.
    pub input_tokens: u32,
    /// Number of tokens in the output/completion.
    pub output_tokens: u32,
}

/// One chat-completion request.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    /// Model identifier forwarded to the provider.
    pub model: String,
    /// System prompt.
    pub system: String,
    /// User message.
    pub user: String,
    /// Maximum tokens to generate.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f32,
    /// Request `response_format: json_object` from the provider.
    pub json_response: bool,
}

/// Raw response from one chat-completion request.
#[derive(Debug, Clone)]
pub struct ChatResponse {
    /// The generated text content.
    pub text: String,
    /// Token usage, when the provider reported it.
    pub usage: Option<TokenUsage>,
    /// The model that produced this response.
    pub model: String,
}

/// Transport seam for the chat-completions API.
///
/// The production implementation is [`openai::OpenAiProvider`]; tests
/// substitute scripted mocks.
#[async_trait::async_trait]
pub trait ChatProvider: Send + Sync {
    /// Issue one request with the given per-call timeout.
    async fn chat(&self, request: &ChatRequest, timeout: Duration)
        -> Result<ChatResponse, LlmError>;
}

/// Rough token estimate for when the provider omits usage: one token per
/// four characters, rounded up.
pub fn estimate_tokens(text: &str) -> u32 {
    let len = text.len() as u32;
    len.div_ceil(4)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn estimate_tokens_rounds_up() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens("abcde"), 2);
        assert_eq!(estimate_tokens(&"x".repeat(400)), 100);
    }
}

//! OpenAI-compatible chat-completions transport.
//!
//! Works with OpenAI and any endpoint sharing the same request/response
//! format. Maps HTTP failures into the [`LlmError`] taxonomy the client
//! retries on; in particular it separates per-minute 429s (retryable with
//! the parsed delay hint) from per-day quota exhaustion (which requires
//! model fallback).

use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::{ChatProvider, ChatRequest, ChatResponse, TokenUsage};
use crate::error::LlmError;

/// A chat-completions provider speaking the OpenAI wire format.
pub struct OpenAiProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl OpenAiProvider {
    /// Create a new provider. `base_url` should not end with a slash.
    pub fn new(base_url: String, api_key: String) -> Self {
        OpenAiProvider {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }
}

/// Parse the "Please try again in Ns" hint some providers embed in 429
/// error bodies. Fractional seconds round up.
fn parse_retry_hint(body: &str) -> Option<u64> {
    static HINT: OnceLock<Regex> = OnceLock::new();
    let re = HINT.get_or_init(|| {
        Regex::new(r"try again in (\d+(?:\.\d+)?)\s*s").expect("valid regex")
    });
    let captures = re.captures(body)?;
    let secs: f64 = captures.get(1)?.as_str().parse().ok()?;
    Some(secs.ceil() as u64)
}

/// Whether a 429 body describes a per-day quota rather than a per-minute
/// window.
fn is_daily_limit(body: &str) -> bool {
    body.to_lowercase().contains("requests per day")
}

#[async_trait::async_trait]
impl ChatProvider for OpenAiProvider {
    async fn chat(
        &self,
        request: &ChatRequest,
        timeout: Duration,
    ) -> Result<ChatResponse, LlmError> {
        tracing::debug!(
            model = %request.model,
            max_tokens = request.max_tokens,
            json = request.json_response,
            "LLM request",
        );

        let body = ChatCompletionRequest {
            model: &request.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &request.system,
                },
                ChatMessage {
                    role: "user",
                    content: &request.user,
                },
            ],
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            response_format: request.json_response.then(|| ResponseFormat {
                format_type: "json_object",
            }),
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .timeout(timeout)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();

            if status == 429 {
                let header_hint = response
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok());
                let text = response.text().await.unwrap_or_default();
                return Err(LlmError::RateLimited {
                    retry_after_secs: parse_retry_hint(&text).or(header_hint),
                    daily: is_daily_limit(&text),
                });
            }

            let text = response.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                status,
                message: text,
            });
        }

        let parsed: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| LlmError::MalformedResponse(format!("response body: {e}")))?;

        let text = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .unwrap_or_default();

        let usage = parsed.usage.map(|u| TokenUsage {
            input_tokens: u.prompt_tokens.unwrap_or(0),
            output_tokens: u.completion_tokens.unwrap_or(0),
        });

        tracing::debug!(chars = text.len(), "LLM response");

        Ok(ChatResponse {
            text,
            usage,
            model: if parsed.model.is_empty() {
                request.model.clone()
            } else {
                parsed.model
            },
        })
    }
}

// --- Internal Serde types ---

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    model: String,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: String,
}

#[derive(Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: Option<u32>,
    #[serde(default)]
    completion_tokens: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request(model: &str) -> ChatRequest {
        ChatRequest {
            model: model.to_string(),
            system: "You extract product ideas.".to_string(),
            user: "hello".to_string(),
            max_tokens: 100,
            temperature: 0.4,
            json_response: true,
        }
    }

    #[test]
    fn retry_hint_parses_whole_and_fractional() {
        assert_eq!(parse_retry_hint("Please try again in 20s."), Some(20));
        assert_eq!(parse_retry_hint("Please try again in 7.66s."), Some(8));
        assert_eq!(parse_retry_hint("no hint here"), None);
    }

    #[test]
    fn daily_limit_detection() {
        assert!(is_daily_limit(
            "Rate limit reached: 200 requests per day. Please try again in 86400s."
        ));
        assert!(!is_daily_limit("Rate limit reached: 30 requests per minute."));
    }

    #[tokio::test]
    async fn chat_success_with_usage() {
        let server = MockServer::start().await;

        let body = serde_json::json!({
            "choices": [{"message": {"content": "{\"ideas\":[]}"}}],
            "model": "gpt-4o-mini",
            "usage": {"prompt_tokens": 12, "completion_tokens": 4}
        });

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer test-key"))
            .and(body_partial_json(
                serde_json::json!({"response_format": {"type": "json_object"}}),
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(&body))
            .mount(&server)
            .await;

        let provider = OpenAiProvider::new(server.uri(), "test-key".into());
        let resp = provider
            .chat(&request("gpt-4o-mini"), Duration::from_secs(5))
            .await
            .expect("chat");

        assert_eq!(resp.text, "{\"ideas\":[]}");
        let usage = resp.usage.expect("usage");
        assert_eq!(usage.input_tokens, 12);
        assert_eq!(usage.output_tokens, 4);
    }

    #[tokio::test]
    async fn chat_429_with_body_hint() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(429).set_body_string(
                "Rate limit reached for model. Please try again in 20s.",
            ))
            .mount(&server)
            .await;

        let provider = OpenAiProvider::new(server.uri(), "key".into());
        let err = provider
            .chat(&request("gpt-4o-mini"), Duration::from_secs(5))
            .await
            .unwrap_err();

        match err {
            LlmError::RateLimited {
                retry_after_secs,
                daily,
            } => {
                assert_eq!(retry_after_secs, Some(20));
                assert!(!daily);
            }
            other => panic!("expected RateLimited, got: {other}"),
        }
    }

    #[tokio::test]
    async fn chat_429_daily_quota() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(429).set_body_string(
                "Rate limit reached: 200 requests per day. Please try again in 3600s.",
            ))
            .mount(&server)
            .await;

        let provider = OpenAiProvider::new(server.uri(), "key".into());
        let err = provider
            .chat(&request("gpt-4o-mini"), Duration::from_secs(5))
            .await
            .unwrap_err();

        match err {
            LlmError::RateLimited { daily, .. } => assert!(daily),
            other => panic!("expected RateLimited, got: {other}"),
        }
    }

    #[tokio::test]
    async fn chat_500_maps_to_api_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(500).set_body_string("internal error"))
            .mount(&server)
            .await;

        let provider = OpenAiProvider::new(server.uri(), "key".into());
        let err = provider
            .chat(&request("gpt-4o-mini"), Duration::from_secs(5))
            .await
            .unwrap_err();

        match err {
            LlmError::Api { status, .. } => assert_eq!(status, 500),
            other => panic!("expected Api, got: {other}"),
        }
    }

    #[tokio::test]
    async fn missing_usage_is_none() {
        let server = MockServer::start().await;

        let body = serde_json::json!({
            "choices": [{"message": {"content": "{}"}}]
        });

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(&body))
            .mount(&server)
            .await;

        let provider = OpenAiProvider::new(server.uri(), "key".into());
        let resp = provider
            .chat(&request("gpt-4o-mini"), Duration::from_secs(5))
            .await
            .expect("chat");

        assert!(resp.usage.is_none());
        // Falls back to the requested model when the body omits one.
        assert_eq!(resp.model, "gpt-4o-mini");
    }
}

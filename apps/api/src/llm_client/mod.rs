/// LLM Client: the single point of entry for all model calls in the resume filter.
///
/// ARCHITECTURAL RULE: agents never call the Anthropic API directly.
/// Every generation goes through the `TextBackend` trait, which `LlmClient` implements.
///
/// Model: claude-sonnet-4-5 (hardcoded, every agent runs on the same model)
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

pub mod prompts;
#[cfg(test)]
pub mod testing;

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
/// The model used by every agent in the pipeline.
pub const MODEL: &str = "claude-sonnet-4-5";
const MAX_TOKENS: u32 = 4096;
pub const DEFAULT_MAX_RETRIES: u32 = 3;
const BACKOFF_BASE: Duration = Duration::from_secs(1);

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Rate limited after {retries} retries")]
    RateLimited { retries: u32 },

    #[error("LLM returned empty content")]
    EmptyContent,
}

/// Speaker of a conversation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One message of the conversation history shared by the agents of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Everything a backend needs to produce one agent response.
#[derive(Debug, Clone, Copy)]
pub struct GenerationRequest<'a> {
    /// Name of the agent the response is generated for (logging only).
    pub agent: &'a str,
    /// Rendered agent instruction, with the session state already substituted.
    pub system: &'a str,
    pub messages: &'a [ChatMessage],
}

/// A text-generation backend. Swap implementations without touching the pipeline.
///
/// Carried in `Pipeline` as `Arc<dyn TextBackend>`.
#[async_trait]
pub trait TextBackend: Send + Sync {
    async fn generate(&self, request: GenerationRequest<'_>) -> Result<String, LlmError>;
}

#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<AnthropicMessage<'a>>,
}

#[derive(Debug, PartialEq, Serialize)]
struct AnthropicMessage<'a> {
    role: &'a str,
    content: String,
}

#[derive(Debug, Deserialize)]
pub struct LlmResponse {
    pub content: Vec<ContentBlock>,
    pub usage: Usage,
}

#[derive(Debug, Deserialize)]
pub struct ContentBlock {
    #[serde(rename = "type")]
    pub block_type: String,
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl LlmResponse {
    /// Extracts the text content from the first text block.
    pub fn text(&self) -> Option<&str> {
        self.content
            .iter()
            .find(|b| b.block_type == "text")
            .and_then(|b| b.text.as_deref())
    }
}

#[derive(Debug, Deserialize)]
struct AnthropicError {
    error: AnthropicErrorBody,
}

#[derive(Debug, Deserialize)]
struct AnthropicErrorBody {
    message: String,
}

/// Anthropic Messages API backend with retry on transient failures.
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    api_url: String,
    api_key: String,
    /// Retries after the first attempt.
    max_retries: u32,
    backoff_base: Duration,
}

impl LlmClient {
    pub fn new(api_key: String, max_retries: u32) -> Result<Self, LlmError> {
        Ok(Self {
            client: Client::builder().timeout(Duration::from_secs(120)).build()?,
            api_url: ANTHROPIC_API_URL.to_string(),
            api_key,
            max_retries,
            backoff_base: BACKOFF_BASE,
        })
    }

    /// Makes a raw call to the Claude API, returning the full response object.
    /// Transport errors, 429 and 5xx are retried up to `max_retries` times with
    /// exponential backoff. Any other non-success status fails immediately.
    pub async fn call(
        &self,
        system: &str,
        messages: &[ChatMessage],
    ) -> Result<LlmResponse, LlmError> {
        let request_body = AnthropicRequest {
            model: MODEL,
            max_tokens: MAX_TOKENS,
            system,
            messages: coalesce_messages(messages),
        };

        let mut last_error: Option<LlmError> = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = backoff_delay(self.backoff_base, attempt);
                warn!(
                    "LLM call attempt {} failed, retrying after {}ms...",
                    attempt,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            let response = self
                .client
                .post(&self.api_url)
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", ANTHROPIC_VERSION)
                .json(&request_body)
                .send()
                .await;

            let response = match response {
                Ok(r) => r,
                Err(e) => {
                    last_error = Some(LlmError::Http(e));
                    continue;
                }
            };

            let status = response.status();
            if status.is_success() {
                let llm_response: LlmResponse = response.json().await?;
                debug!(
                    "LLM call succeeded: input_tokens={}, output_tokens={}",
                    llm_response.usage.input_tokens, llm_response.usage.output_tokens
                );
                return Ok(llm_response);
            }

            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<AnthropicError>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            let error = LlmError::Api {
                status: status.as_u16(),
                message,
            };
            if !is_retryable(status) {
                return Err(error);
            }
            warn!("LLM API returned {status}: {error}");
            last_error = Some(error);
        }

        Err(last_error.unwrap_or(LlmError::RateLimited {
            retries: self.max_retries,
        }))
    }
}

/// Statuses worth another attempt: rate limiting and server-side failures.
fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// Delay before retry number `attempt` (1-based): base, 2x base, 4x base...
/// The exponent stops growing after five doublings.
fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    base * (1u32 << attempt.saturating_sub(1).min(5))
}

#[async_trait]
impl TextBackend for LlmClient {
    async fn generate(&self, request: GenerationRequest<'_>) -> Result<String, LlmError> {
        debug!(agent = request.agent, "Generating agent response");
        let response = self.call(request.system, request.messages).await?;
        response
            .text()
            .map(str::to_string)
            .ok_or(LlmError::EmptyContent)
    }
}

/// Merges consecutive messages from the same speaker.
/// The Messages API rejects histories whose roles do not alternate, and a
/// session history can hold back-to-back assistant messages after a handoff.
fn coalesce_messages(messages: &[ChatMessage]) -> Vec<AnthropicMessage<'static>> {
    let mut merged: Vec<AnthropicMessage<'static>> = Vec::with_capacity(messages.len());
    for message in messages {
        let role = match message.role {
            Role::User => "user",
            Role::Assistant => "assistant",
        };
        match merged.last_mut() {
            Some(last) if last.role == role => {
                last.content.push_str("\n\n");
                last.content.push_str(&message.content);
            }
            _ => merged.push(AnthropicMessage {
                role,
                content: message.content.clone(),
            }),
        }
    }
    merged
}

/// Strips ```json ... ``` or ``` ... ``` code fences from LLM output.
pub fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    if let Some(stripped) = text.strip_prefix("```json") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else if let Some(stripped) = text.strip_prefix("```") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else {
        text
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use axum::{routing::post, Json, Router};
    use serde_json::json;

    use super::*;

    /// Serves the Messages API locally, answering with `statuses` in order and
    /// 200 once they run out. Returns the endpoint URL and the hit counter.
    async fn spawn_messages_api(statuses: Vec<u16>) -> (String, Arc<AtomicUsize>) {
        let hits = Arc::new(AtomicUsize::new(0));
        let statuses = Arc::new(statuses);
        let counter = hits.clone();
        let app = Router::new().route(
            "/v1/messages",
            post(move || {
                let counter = counter.clone();
                let statuses = statuses.clone();
                async move {
                    let n = counter.fetch_add(1, Ordering::SeqCst);
                    match statuses.get(n).copied() {
                        Some(code) if code != 200 => (
                            axum::http::StatusCode::from_u16(code).unwrap(),
                            Json(json!({ "error": { "message": "scripted failure" } })),
                        ),
                        _ => (
                            axum::http::StatusCode::OK,
                            Json(json!({
                                "content": [{ "type": "text", "text": "ok" }],
                                "usage": { "input_tokens": 1, "output_tokens": 1 }
                            })),
                        ),
                    }
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}/v1/messages"), hits)
    }

    fn local_client(api_url: String, max_retries: u32) -> LlmClient {
        LlmClient {
            client: Client::builder().no_proxy().build().unwrap(),
            api_url,
            api_key: "test-key".to_string(),
            max_retries,
            backoff_base: Duration::from_millis(1),
        }
    }

    async fn call(client: &LlmClient) -> Result<LlmResponse, LlmError> {
        client.call("system", &[ChatMessage::user("hi")]).await
    }

    #[test]
    fn test_retryable_statuses() {
        assert!(is_retryable(StatusCode::TOO_MANY_REQUESTS));
        assert!(is_retryable(StatusCode::INTERNAL_SERVER_ERROR));
        assert!(is_retryable(StatusCode::SERVICE_UNAVAILABLE));
        assert!(!is_retryable(StatusCode::BAD_REQUEST));
        assert!(!is_retryable(StatusCode::UNAUTHORIZED));
        assert!(!is_retryable(StatusCode::NOT_FOUND));
    }

    #[test]
    fn test_backoff_doubles_then_caps() {
        let base = Duration::from_secs(1);
        assert_eq!(backoff_delay(base, 1), Duration::from_secs(1));
        assert_eq!(backoff_delay(base, 2), Duration::from_secs(2));
        assert_eq!(backoff_delay(base, 3), Duration::from_secs(4));
        assert_eq!(backoff_delay(base, 6), Duration::from_secs(32));
        assert_eq!(backoff_delay(base, 20), Duration::from_secs(32));
    }

    #[tokio::test]
    async fn test_server_errors_are_retried_until_success() {
        let (url, hits) = spawn_messages_api(vec![503, 500]).await;
        let response = call(&local_client(url, 2)).await.unwrap();
        assert_eq!(response.text(), Some("ok"));
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_rate_limit_is_retried() {
        let (url, hits) = spawn_messages_api(vec![429]).await;
        assert!(call(&local_client(url, 1)).await.is_ok());
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_client_errors_fail_without_retry() {
        let (url, hits) = spawn_messages_api(vec![400]).await;
        let err = call(&local_client(url, 3)).await.unwrap_err();
        assert!(matches!(
            err,
            LlmError::Api { status: 400, ref message } if message == "scripted failure"
        ));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_max_retries_counts_retries_after_first_attempt() {
        let (url, hits) = spawn_messages_api(vec![500; 10]).await;
        let err = call(&local_client(url, 2)).await.unwrap_err();
        assert!(matches!(err, LlmError::Api { status: 500, .. }));
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_zero_retries_makes_a_single_attempt() {
        let (url, hits) = spawn_messages_api(vec![503]).await;
        assert!(call(&local_client(url, 0)).await.is_err());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_strip_json_fences_with_json_tag() {
        let input = "```json\n{\"key\": \"value\"}\n```";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_strip_json_fences_without_tag() {
        let input = "```\n[1, 2]\n```";
        assert_eq!(strip_json_fences(input), "[1, 2]");
    }

    #[test]
    fn test_strip_json_fences_no_fences() {
        let input = "  {\"key\": \"value\"}  ";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_coalesce_merges_back_to_back_assistant_messages() {
        let history = vec![
            ChatMessage::user("I am HR"),
            ChatMessage::assistant("Thank you for confirming that you are a HR person"),
            ChatMessage::assistant("Please upload the resume PDF files."),
            ChatMessage::user("resume text"),
        ];
        let merged = coalesce_messages(&history);
        assert_eq!(merged.len(), 3);
        assert_eq!(merged[1].role, "assistant");
        assert!(merged[1].content.contains("HR person\n\nPlease upload"));
        assert_eq!(merged[2].role, "user");
    }

    #[test]
    fn test_coalesce_keeps_alternating_history_intact() {
        let history = vec![ChatMessage::user("hi"), ChatMessage::assistant("hello")];
        let merged = coalesce_messages(&history);
        assert_eq!(
            merged,
            vec![
                AnthropicMessage {
                    role: "user",
                    content: "hi".to_string()
                },
                AnthropicMessage {
                    role: "assistant",
                    content: "hello".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_request_serializes_in_messages_api_shape() {
        let history = vec![ChatMessage::user("hi")];
        let body = AnthropicRequest {
            model: MODEL,
            max_tokens: MAX_TOKENS,
            system: "You are the greeting agent.",
            messages: coalesce_messages(&history),
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["model"], MODEL);
        assert_eq!(value["system"], "You are the greeting agent.");
        assert_eq!(value["messages"][0]["role"], "user");
        assert_eq!(value["messages"][0]["content"], "hi");
    }

    #[test]
    fn test_response_text_picks_first_text_block() {
        let json = r#"{
            "content": [
                {"type": "tool_use", "text": null},
                {"type": "text", "text": "Hello there"}
            ],
            "usage": {"input_tokens": 12, "output_tokens": 3}
        }"#;
        let response: LlmResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.text(), Some("Hello there"));
    }
}

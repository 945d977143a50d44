//! Language model client
//!
//! - [`LlmClient`]: one completion call per request
//! - [`HttpLlmClient`]: OpenAI-compatible chat completions over `reqwest`
//! - [`complete_bounded`]: a completion raced against a timeout and a
//!   cancellation token

use crate::error::LlmError;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use scribe_types::{ConversationHistory, Role};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Characters of prompts and outputs kept in debug logs
pub const MAX_LOG_CHARS: usize = 2_000;

/// Chat message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    /// System prompt
    System,
    /// User turn
    User,
    /// Assistant turn
    Assistant,
}

impl From<Role> for ChatRole {
    fn from(role: Role) -> Self {
        match role {
            Role::User => ChatRole::User,
            Role::Assistant => ChatRole::Assistant,
        }
    }
}

/// One chat message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Role
    pub role: ChatRole,
    /// Content
    pub content: String,
}

impl ChatMessage {
    /// System message
    #[inline]
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    /// User message
    #[inline]
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    /// Assistant message
    #[inline]
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// Which pipeline step issues a call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CallPurpose {
    /// Task classification
    Route,
    /// Instruction planning
    Plan,
    /// Response generation
    Generate,
}

/// Requested response format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseFormat {
    /// Free text
    #[default]
    Text,
    /// A single JSON object
    Json,
}

/// Completion options
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionOptions {
    /// Model name
    pub model: String,
    /// Sampling temperature
    pub temperature: f32,
    /// Token ceiling
    pub max_tokens: Option<u32>,
    /// Response format
    pub response_format: ResponseFormat,
    /// Calling step
    pub purpose: CallPurpose,
}

impl CompletionOptions {
    /// Create options for a step
    #[inline]
    #[must_use]
    pub fn new(purpose: CallPurpose, model: impl Into<String>, temperature: f32) -> Self {
        Self {
            model: model.into(),
            temperature,
            max_tokens: None,
            response_format: ResponseFormat::Text,
            purpose,
        }
    }

    /// With token ceiling
    #[inline]
    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Request a JSON object
    #[inline]
    #[must_use]
    pub fn json(mut self) -> Self {
        self.response_format = ResponseFormat::Json;
        self
    }
}

/// A completion request
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    /// Messages, system first
    pub messages: Vec<ChatMessage>,
    /// Options
    pub options: CompletionOptions,
}

impl CompletionRequest {
    /// Create request
    #[inline]
    #[must_use]
    pub fn new(messages: Vec<ChatMessage>, options: CompletionOptions) -> Self {
        Self { messages, options }
    }

    /// Concatenated content of every message
    #[must_use]
    pub fn prompt_text(&self) -> String {
        self.messages
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Language model client
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Run one completion
    async fn complete(&self, request: CompletionRequest) -> Result<String, LlmError>;
}

#[async_trait]
impl<T: LlmClient + ?Sized> LlmClient for Arc<T> {
    async fn complete(&self, request: CompletionRequest) -> Result<String, LlmError> {
        (**self).complete(request).await
    }
}

/// Run a completion bounded by `timeout` and `cancel`
///
/// # Errors
/// [`LlmError::Timeout`] when the call outlives `timeout`,
/// [`LlmError::Cancelled`] when `cancel` fires, otherwise the client's error.
pub async fn complete_bounded(
    client: &dyn LlmClient,
    request: CompletionRequest,
    timeout: Duration,
    cancel: &CancellationToken,
) -> Result<String, LlmError> {
    let purpose = request.options.purpose;
    if tracing::enabled!(tracing::Level::DEBUG) {
        tracing::debug!(
            ?purpose,
            model = %request.options.model,
            temperature = request.options.temperature,
            prompt = %truncate_for_log(&request.prompt_text(), MAX_LOG_CHARS),
            "model request"
        );
    }

    let outcome = tokio::select! {
        biased;
        () = cancel.cancelled() => return Err(LlmError::Cancelled),
        outcome = tokio::time::timeout(timeout, client.complete(request)) => outcome,
    };

    let output = outcome.map_err(|_| LlmError::Timeout {
        millis: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
    })??;

    tracing::debug!(
        ?purpose,
        output = %truncate_for_log(&output, MAX_LOG_CHARS),
        "model response"
    );
    Ok(output)
}

/// Truncate `input` to `max_chars` characters for logging
#[must_use]
pub fn truncate_for_log(input: &str, max_chars: usize) -> String {
    let char_count = input.chars().count();
    if char_count <= max_chars {
        return input.to_string();
    }
    let mut preview: String = input.chars().take(max_chars).collect();
    let _ = write!(preview, "... [truncated, total_chars={char_count}]");
    preview
}

/// Conversation turns rendered as chat messages, oldest first
#[must_use]
pub fn history_messages(history: &ConversationHistory, turns: usize) -> Vec<ChatMessage> {
    history
        .recent(turns)
        .into_iter()
        .map(|turn| ChatMessage {
            role: turn.role.into(),
            content: turn.content.clone(),
        })
        .collect()
}

/// HTTP client configuration (OpenAI-compatible)
#[derive(Debug, Clone)]
pub struct HttpLlmConfig {
    /// Chat completions endpoint
    pub endpoint: String,
    /// Bearer token
    pub api_key: Option<String>,
    /// Extra headers sent with every call
    pub extra_headers: HeaderMap,
}

impl HttpLlmConfig {
    /// Create config for an endpoint
    #[inline]
    #[must_use]
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: None,
            extra_headers: HeaderMap::new(),
        }
    }

    /// With API key
    #[inline]
    #[must_use]
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }
}

/// Language model client over an OpenAI-compatible HTTP API
#[derive(Debug, Clone)]
pub struct HttpLlmClient {
    client: reqwest::Client,
    config: HttpLlmConfig,
}

impl HttpLlmClient {
    /// Create client
    ///
    /// # Errors
    /// Returns [`LlmError::Http`] when the HTTP client cannot be built.
    pub fn new(config: HttpLlmConfig) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| LlmError::Http(e.to_string()))?;
        Ok(Self { client, config })
    }

    fn headers(&self) -> Result<HeaderMap, LlmError> {
        let mut headers = self.config.extra_headers.clone();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(key) = &self.config.api_key {
            let value = HeaderValue::from_str(&format!("Bearer {key}"))
                .map_err(|e| LlmError::Http(e.to_string()))?;
            headers.insert(AUTHORIZATION, value);
        }
        Ok(headers)
    }
}

#[derive(Debug, Serialize)]
struct ChatRequestBody<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormatBody>,
}

#[derive(Debug, Serialize)]
struct ResponseFormatBody {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponseBody {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl LlmClient for HttpLlmClient {
    async fn complete(&self, request: CompletionRequest) -> Result<String, LlmError> {
        let body = ChatRequestBody {
            model: &request.options.model,
            messages: &request.messages,
            temperature: request.options.temperature,
            max_tokens: request.options.max_tokens,
            response_format: match request.options.response_format {
                ResponseFormat::Json => Some(ResponseFormatBody {
                    kind: "json_object",
                }),
                ResponseFormat::Text => None,
            },
        };

        let response = self
            .client
            .post(&self.config.endpoint)
            .headers(self.headers()?)
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(LlmError::Response(format!(
                "HTTP {status}: {}",
                truncate_for_log(&text, 500)
            )));
        }

        let text = response
            .text()
            .await
            .map_err(|e| LlmError::Http(e.to_string()))?;
        let parsed: ChatResponseBody =
            serde_json::from_str(&text).map_err(|e| LlmError::Serialization(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| LlmError::Response("missing choices".to_string()))
    }
}

//! OpenAI-compatible HTTP client for chat-completion endpoints.
//!
//! Works against OpenAI itself and against gateways exposing the same
//! `{base}/chat/completions` API (vLLM, ollama, llama.cpp, LiteLLM).

use super::{CompletionProvider, LlmConfig, SseDecoder};
use crate::driver::millis;
use crate::result::Spec2IrResult;
use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::time::{Duration, Instant};

/// Chat message role.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System prompt
    System,
    /// User message
    User,
    /// Assistant response
    Assistant,
}

/// A single chat message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// The role of the message author.
    pub role: Role,
    /// The content of the message.
    #[serde(default)]
    pub content: String,
}

impl ChatMessage {
    /// System message
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    /// User message
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Parameters for a chat completion request.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    /// Model identifier.
    pub model: String,
    /// The messages for the chat completion.
    pub messages: Vec<ChatMessage>,
    /// Sampling temperature (0.0 = deterministic).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// Maximum tokens to generate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Whether to stream the response.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
}

/// Token usage statistics.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Usage {
    /// Tokens in the prompt.
    pub prompt_tokens: u32,
    /// Tokens generated.
    pub completion_tokens: u32,
    /// Total tokens (prompt + completion).
    pub total_tokens: u32,
}

/// A single completion choice.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChatResponseChoice {
    /// Index of this choice.
    #[serde(default)]
    pub index: u32,
    /// The generated message.
    pub message: ChatMessage,
    /// Why generation stopped.
    pub finish_reason: Option<String>,
}

/// Response from a chat completion endpoint.
///
/// Gateways differ in which bookkeeping fields they fill in, so everything
/// but `choices` is optional on the wire.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChatResponse {
    /// Unique identifier for this completion.
    #[serde(default)]
    pub id: String,
    /// Object type (usually "chat.completion").
    #[serde(default)]
    pub object: String,
    /// Unix timestamp of creation.
    #[serde(default)]
    pub created: u64,
    /// Model used.
    #[serde(default)]
    pub model: String,
    /// Generated choices.
    pub choices: Vec<ChatResponseChoice>,
    /// Token usage statistics.
    pub usage: Option<Usage>,
}

impl ChatResponse {
    /// Content of the first choice
    #[must_use]
    pub fn first_content(&self) -> Option<&str> {
        self.choices.first().map(|c| c.message.content.as_str())
    }
}

/// Errors from the LLM client.
#[derive(Debug, thiserror::Error)]
pub enum LlmClientError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    /// Server returned an error status.
    #[error("API error {status}: {body}")]
    ApiError {
        /// HTTP status code.
        status: u16,
        /// Response body.
        body: String,
    },
    /// Response carried no choices.
    #[error("completion response contained no choices")]
    EmptyResponse,
}

/// OpenAI-compatible HTTP client.
#[derive(Debug, Clone)]
pub struct LlmClient {
    base_url: String,
    client: reqwest::Client,
    model: String,
    api_key: Option<String>,
    stream: bool,
    echo_stream: bool,
}

impl LlmClient {
    /// Create a new client pointing at the given base URL.
    ///
    /// # Arguments
    /// * `base_url` - API root including any version segment (e.g., `http://localhost:8000/v1`)
    /// * `model` - Model name to include in requests
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .unwrap_or_default();
        Self::with_client(base_url, model, client)
    }

    /// Create a client with a custom reqwest client (for custom timeouts, etc.).
    pub fn with_client(
        base_url: impl Into<String>,
        model: impl Into<String>,
        client: reqwest::Client,
    ) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
            model: model.into(),
            api_key: None,
            stream: false,
            echo_stream: false,
        }
    }

    /// Build a client from resolved settings.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmClientError> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self::with_client(&config.base_url, &config.model, client)
            .with_api_key(&config.api_key)
            .with_streaming(config.stream))
    }

    /// Send `Authorization: Bearer <key>`
    #[must_use]
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Request server-sent events instead of a single JSON body
    #[must_use]
    pub const fn with_streaming(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    /// Echo streamed chunks to stderr as they arrive
    #[must_use]
    pub const fn with_stream_echo(mut self, echo: bool) -> Self {
        self.echo_stream = echo;
        self
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Get the model name.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Whether completions are streamed
    pub const fn is_streaming(&self) -> bool {
        self.stream
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    fn request(&self, messages: Vec<ChatMessage>, stream: bool) -> ChatRequest {
        ChatRequest {
            model: self.model.clone(),
            messages,
            temperature: Some(0.0),
            max_tokens: None,
            stream: stream.then_some(true),
        }
    }

    async fn send(&self, request: &ChatRequest) -> Result<reqwest::Response, LlmClientError> {
        let mut builder = self.client.post(self.endpoint()).json(request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }
        let resp = builder.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(LlmClientError::ApiError {
                status: status.as_u16(),
                body,
            });
        }
        Ok(resp)
    }

    /// Send a non-streaming chat completion request.
    ///
    /// # Errors
    /// Returns an error if the HTTP request fails or the server returns an error status.
    pub async fn chat_completion(
        &self,
        messages: Vec<ChatMessage>,
    ) -> Result<ChatResponse, LlmClientError> {
        let request = self.request(messages, false);
        let start = Instant::now();
        let response: ChatResponse = self.send(&request).await?.json().await?;
        tracing::debug!(
            model = %self.model,
            latency_ms = millis(start.elapsed()),
            total_tokens = response.usage.as_ref().map_or(0, |u| u.total_tokens),
            "chat completion finished"
        );
        Ok(response)
    }

    /// Send a streaming chat completion request, calling `on_chunk` for each
    /// content delta, and return the concatenated text.
    ///
    /// # Errors
    /// Returns an error if the HTTP request fails or the server returns an error status.
    pub async fn chat_completion_stream<F>(
        &self,
        messages: Vec<ChatMessage>,
        mut on_chunk: F,
    ) -> Result<String, LlmClientError>
    where
        F: FnMut(&str) + Send,
    {
        let request = self.request(messages, true);
        let start = Instant::now();
        let mut body = self.send(&request).await?.bytes_stream();
        let mut decoder = SseDecoder::new();
        let mut text = String::new();

        while let Some(bytes) = body.next().await {
            for chunk in decoder.feed(&bytes?) {
                on_chunk(&chunk);
                text.push_str(&chunk);
            }
            if decoder.is_done() {
                break;
            }
        }
        for chunk in decoder.finish() {
            on_chunk(&chunk);
            text.push_str(&chunk);
        }
        tracing::debug!(
            model = %self.model,
            latency_ms = millis(start.elapsed()),
            chars = text.chars().count(),
            "streamed chat completion finished"
        );
        Ok(text)
    }
}

fn echo_chunk(chunk: &str) {
    let mut stderr = std::io::stderr().lock();
    let _ = stderr.write_all(chunk.as_bytes());
    let _ = stderr.flush();
}

#[async_trait]
impl CompletionProvider for LlmClient {
    fn name(&self) -> &str {
        "openai-compat"
    }

    async fn complete(&self, system: &str, user: &str) -> Spec2IrResult<String> {
        let messages = vec![ChatMessage::system(system), ChatMessage::user(user)];
        if self.stream {
            let echo = self.echo_stream;
            let text = self
                .chat_completion_stream(messages, |chunk| {
                    if echo {
                        echo_chunk(chunk);
                    }
                })
                .await?;
            if echo && !text.is_empty() {
                echo_chunk("\n");
            }
            return Ok(text);
        }
        let response = self.chat_completion(messages).await?;
        Ok(response
            .first_content()
            .ok_or(LlmClientError::EmptyResponse)?
            .to_string())
    }
}

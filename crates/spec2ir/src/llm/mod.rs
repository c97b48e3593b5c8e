//! Language-model completion providers.
//!
//! - **Provider trait**: `complete(system, user) -> text` is all the converter needs
//! - **Mock**: deterministic output for demos and tests
//! - **Client**: OpenAI-compatible chat completions over HTTP, with SSE streaming (feature `llm`)

mod config;
mod mock;
mod sse;

#[cfg(feature = "llm")]
pub mod client;

pub use config::LlmConfig;
pub use mock::MockProvider;
pub use sse::SseDecoder;

#[cfg(feature = "llm")]
pub use client::{
    ChatMessage, ChatRequest, ChatResponse, ChatResponseChoice, LlmClient, LlmClientError, Role,
    Usage,
};

use crate::result::Spec2IrResult;
use async_trait::async_trait;

/// Something that turns a system + user prompt into text
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &str;

    /// Complete the conversation. The text should contain one JSON object but
    /// may be wrapped in prose or code fences.
    async fn complete(&self, system: &str, user: &str) -> Spec2IrResult<String>;
}

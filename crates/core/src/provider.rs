//! Provider trait: the abstraction over language-model backends.
//!
//! A Provider knows how to send a prompt to a model and get text back,
//! either as one complete string or as a stream of text deltas.
//!
//! Implementations: hosted chat-completions endpoint, custom HTTP workflow.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use crate::error::ProviderError;
use crate::message::PromptMessage;

/// A request to a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderRequest {
    /// The model to use (e.g., "gpt-4.1-mini")
    pub model: String,

    /// The prompt messages, in order
    pub messages: Vec<PromptMessage>,

    /// The raw user input this request answers.
    ///
    /// Backends that keep their own session memory only take this string
    /// rather than the assembled prompt.
    #[serde(default)]
    pub query: String,

    /// Temperature (0.0 = deterministic, 1.0 = creative)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Whether to stream the response
    #[serde(default)]
    pub stream: bool,
}

fn default_temperature() -> f32 {
    0.7
}

impl ProviderRequest {
    /// Create a request with default sampling settings.
    pub fn new(model: impl Into<String>, messages: Vec<PromptMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            query: String::new(),
            temperature: default_temperature(),
            max_tokens: None,
            stream: false,
        }
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = query.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// The text a single-input backend should receive: the raw query, or the
    /// text of the last user message that has any.
    pub fn input_text(&self) -> String {
        if !self.query.trim().is_empty() {
            return self.query.clone();
        }
        self.messages
            .iter()
            .rev()
            .filter(|m| m.role == crate::message::Role::User)
            .map(|m| m.text())
            .find(|t| !t.trim().is_empty())
            .unwrap_or_default()
    }
}

/// Token usage information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// A single chunk in a streaming response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StreamChunk {
    /// Partial content delta
    #[serde(default)]
    pub content: Option<String>,

    /// Whether this is the final chunk
    #[serde(default)]
    pub done: bool,

    /// Usage info (typically only in the final chunk)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

impl StreamChunk {
    /// A content delta.
    pub fn delta(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            done: false,
            usage: None,
        }
    }

    /// The terminating chunk.
    pub fn finished() -> Self {
        Self {
            content: None,
            done: true,
            usage: None,
        }
    }
}

/// Receiving half of a provider stream.
///
/// Single-pass and finite: the sender side closes once the provider is done,
/// and each chunk is delivered exactly once.
pub type ChunkReceiver =
    tokio::sync::mpsc::Receiver<std::result::Result<StreamChunk, ProviderError>>;

/// The core Provider trait.
///
/// Every backend (hosted chat completions, custom HTTP workflow) implements
/// this trait. The conversation engine calls `complete()` or `stream()`
/// without knowing which backend is in use.
#[async_trait]
pub trait Provider: Send + Sync {
    /// A human-readable name for this provider (e.g., "openai", "langflow").
    fn name(&self) -> &str;

    /// Send a request and get the complete response text.
    async fn complete(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<String, ProviderError>;

    /// Send a request and get a stream of response chunks.
    ///
    /// Default implementation calls `complete()` and wraps the result as a single chunk.
    async fn stream(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<ChunkReceiver, ProviderError> {
        let text = self.complete(request).await?;
        let (tx, rx) = tokio::sync::mpsc::channel(2);
        let _ = tx.send(Ok(StreamChunk::delta(text))).await;
        let _ = tx.send(Ok(StreamChunk::finished())).await;
        Ok(rx)
    }
}

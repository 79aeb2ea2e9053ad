//! Hosted chat-completions provider.
//!
//! Talks to an OpenAI-style `/chat/completions` endpoint. Multimodal prompt
//! messages are sent as-is; the wire shape of `PromptMessage` already matches
//! the API's `content` string-or-parts form.
//!
//! Supports:
//! - Non-streaming completions
//! - Streaming completions over server-sent events

use async_trait::async_trait;
use futures::StreamExt;
use serde::Deserialize;
use sketchpal_config::ProviderConfig;
use sketchpal_core::error::ProviderError;
use sketchpal_core::provider::*;
use std::time::Duration;
use tracing::{debug, trace};

use crate::{http_client, status_error, transport_error};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// A hosted chat-completions provider.
pub struct HostedProvider {
    name: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl HostedProvider {
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client: http_client(timeout),
        }
    }

    /// Build from a `[hosted]` configuration table.
    ///
    /// A missing API key is a configuration error: there is no point in
    /// sending requests that can only be rejected.
    pub fn from_config(config: &ProviderConfig) -> Result<Self, ProviderError> {
        let api_key = config
            .api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| ProviderError::NotConfigured("hosted API key is not set".into()))?;

        Ok(Self::new(
            "hosted",
            config.api_url.as_deref().unwrap_or(DEFAULT_BASE_URL),
            api_key,
            Duration::from_secs(config.timeout_secs),
        ))
    }

    fn request_body(request: &ProviderRequest, stream: bool) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": request.model,
            "messages": request.messages,
            "temperature": request.temperature,
            "stream": stream,
        });

        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }

        if stream {
            body["stream_options"] = serde_json::json!({ "include_usage": true });
        }

        body
    }

    async fn post(
        &self,
        body: &serde_json::Value,
        accept: &str,
    ) -> Result<reqwest::Response, ProviderError> {
        if self.api_key.is_empty() {
            return Err(ProviderError::NotConfigured("hosted API key is not set".into()));
        }

        let url = format!("{}/chat/completions", self.base_url);
        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .header("Accept", accept)
            .json(body)
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            return Err(status_error(response).await);
        }

        Ok(response)
    }
}

#[async_trait]
impl Provider for HostedProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, request: ProviderRequest) -> Result<String, ProviderError> {
        let body = Self::request_body(&request, false);

        debug!(provider = %self.name, model = %request.model, "Sending completion request");

        let response = self.post(&body, "application/json").await?;

        let api_response: ApiResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(format!("Failed to parse response: {e}")))?;

        if let Some(usage) = &api_response.usage {
            debug!(
                provider = %self.name,
                model = %api_response.model,
                total_tokens = usage.total_tokens,
                "Completion finished"
            );
        }

        let choice = api_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::InvalidResponse("No choices in response".into()))?;

        Ok(choice.message.content.unwrap_or_default())
    }

    async fn stream(&self, request: ProviderRequest) -> Result<ChunkReceiver, ProviderError> {
        let body = Self::request_body(&request, true);

        debug!(provider = %self.name, model = %request.model, "Sending streaming request");

        let response = self.post(&body, "text/event-stream").await?;

        let (tx, rx) = tokio::sync::mpsc::channel(64);
        let provider_name = self.name.clone();

        tokio::spawn(async move {
            let mut byte_stream = response.bytes_stream();
            let mut decoder = SseDecoder::default();

            while let Some(chunk_result) = byte_stream.next().await {
                let bytes = match chunk_result {
                    Ok(b) => b,
                    Err(e) => {
                        let _ = tx
                            .send(Err(ProviderError::StreamInterrupted(e.to_string())))
                            .await;
                        return;
                    }
                };

                for event in decoder.push(&bytes) {
                    match event {
                        SseEvent::Done => {
                            let _ = tx.send(Ok(StreamChunk::finished())).await;
                            return;
                        }
                        SseEvent::Chunk(chunk) => {
                            let last = chunk.done;
                            if tx.send(Ok(chunk)).await.is_err() {
                                return; // receiver dropped
                            }
                            if last {
                                return;
                            }
                        }
                        SseEvent::Unparseable(data) => {
                            trace!(
                                provider = %provider_name,
                                data = %data,
                                "Ignoring unparseable SSE chunk"
                            );
                        }
                    }
                }
            }

            // Stream ended without [DONE]
            let _ = tx.send(Ok(StreamChunk::finished())).await;
        });

        Ok(rx)
    }
}

/// One decoded server-sent event.
#[derive(Debug)]
enum SseEvent {
    Chunk(StreamChunk),
    Done,
    Unparseable(String),
}

/// Line-buffered decoder for the chat-completions SSE format.
///
/// Network reads split lines, and the characters in them, at arbitrary
/// byte offsets. Bytes stay buffered until their newline arrives, so only
/// complete lines are decoded as UTF-8.
#[derive(Debug, Default)]
struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    fn push(&mut self, bytes: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(bytes);
        let mut events = Vec::new();

        while let Some(line_end) = self.buffer.iter().position(|&b| b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=line_end).collect();
            let line = String::from_utf8_lossy(&raw[..line_end]);
            let line = line.trim_end_matches('\r');

            // Blank lines and SSE comments
            if line.is_empty() || line.starts_with(':') {
                continue;
            }

            let Some(data) = line.strip_prefix("data:") else {
                continue;
            };
            let data = data.trim();

            if data == "[DONE]" {
                events.push(SseEvent::Done);
                continue;
            }

            match serde_json::from_str::<StreamResponse>(data) {
                Ok(resp) => {
                    let content = resp
                        .choices
                        .first()
                        .and_then(|c| c.delta.content.clone())
                        .filter(|c| !c.is_empty());

                    if let Some(content) = content {
                        events.push(SseEvent::Chunk(StreamChunk::delta(content)));
                    }

                    // Usage arrives in the final chunk when include_usage is set
                    if let Some(usage) = resp.usage {
                        events.push(SseEvent::Chunk(StreamChunk {
                            content: None,
                            done: true,
                            usage: Some(Usage {
                                prompt_tokens: usage.prompt_tokens,
                                completion_tokens: usage.completion_tokens,
                                total_tokens: usage.total_tokens,
                            }),
                        }));
                    }
                }
                Err(_) => events.push(SseEvent::Unparseable(data.to_string())),
            }
        }

        events
    }
}

// --- Chat-completions API types (internal) ---

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    model: String,
    choices: Vec<ApiChoice>,
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ApiResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct StreamResponse {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    #[serde(default)]
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

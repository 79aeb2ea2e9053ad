//! Shared test doubles for conversation tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use sketchpal_core::capture::{CapturedFrame, ScreenCapture};
use sketchpal_core::error::{CaptureError, ProviderError};
use sketchpal_core::provider::{ChunkReceiver, Provider, ProviderRequest, StreamChunk};

/// One scripted provider reply.
#[derive(Debug, Clone)]
pub enum Reply {
    /// Deltas that make up a successful answer.
    Text(Vec<String>),
    /// The request fails before any output.
    Error(ProviderError),
    /// Some deltas arrive, then the stream breaks.
    Interrupted(Vec<String>, ProviderError),
}

/// A provider that plays back scripted replies in order and records every
/// request it receives. Once the script runs out it answers with
/// `InvalidResponse`.
pub struct ScriptedProvider {
    replies: Mutex<VecDeque<Reply>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    pub fn from_replies(replies: Vec<Reply>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Whole-text replies.
    pub fn new(texts: Vec<&str>) -> Self {
        Self::from_replies(
            texts
                .into_iter()
                .map(|t| Reply::Text(vec![t.to_string()]))
                .collect(),
        )
    }

    /// Replies split into deltas.
    pub fn streaming(replies: Vec<Vec<&str>>) -> Self {
        Self::from_replies(
            replies
                .into_iter()
                .map(|deltas| Reply::Text(deltas.into_iter().map(String::from).collect()))
                .collect(),
        )
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn next_reply(&self, request: ProviderRequest) -> Reply {
        self.requests.lock().unwrap().push(request);
        self.replies.lock().unwrap().pop_front().unwrap_or_else(|| {
            Reply::Error(ProviderError::InvalidResponse("script exhausted".into()))
        })
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<String, ProviderError> {
        match self.next_reply(request) {
            Reply::Text(deltas) => Ok(deltas.concat()),
            Reply::Error(e) | Reply::Interrupted(_, e) => Err(e),
        }
    }

    async fn stream(&self, request: ProviderRequest) -> Result<ChunkReceiver, ProviderError> {
        let (deltas, failure) = match self.next_reply(request) {
            Reply::Text(deltas) => (deltas, None),
            Reply::Error(e) => return Err(e),
            Reply::Interrupted(deltas, e) => (deltas, Some(e)),
        };

        let (tx, rx) = tokio::sync::mpsc::channel(deltas.len() + 2);
        for delta in deltas {
            let _ = tx.send(Ok(StreamChunk::delta(delta))).await;
        }
        let last = match failure {
            Some(e) => Err(e),
            None => Ok(StreamChunk::finished()),
        };
        let _ = tx.send(last).await;
        Ok(rx)
    }
}

/// A provider whose every call fails with the same error.
pub struct FailingProvider {
    error: ProviderError,
    calls: Mutex<usize>,
}

impl FailingProvider {
    pub fn new(error: ProviderError) -> Self {
        Self {
            error,
            calls: Mutex::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl Provider for FailingProvider {
    fn name(&self) -> &str {
        "failing"
    }

    async fn complete(&self, _request: ProviderRequest) -> Result<String, ProviderError> {
        *self.calls.lock().unwrap() += 1;
        Err(self.error.clone())
    }
}

/// A provider that streams a few deltas and then goes silent without
/// closing the stream. `complete` never resolves.
pub struct StallingProvider {
    deltas: Vec<String>,
}

impl StallingProvider {
    pub fn new(deltas: Vec<&str>) -> Self {
        Self {
            deltas: deltas.into_iter().map(String::from).collect(),
        }
    }
}

#[async_trait]
impl Provider for StallingProvider {
    fn name(&self) -> &str {
        "stalling"
    }

    async fn complete(&self, _request: ProviderRequest) -> Result<String, ProviderError> {
        std::future::pending().await
    }

    async fn stream(&self, _request: ProviderRequest) -> Result<ChunkReceiver, ProviderError> {
        let (tx, rx) = tokio::sync::mpsc::channel(self.deltas.len() + 1);
        for delta in &self.deltas {
            let _ = tx.send(Ok(StreamChunk::delta(delta.as_str()))).await;
        }
        // Hold the sender until the consumer walks away
        tokio::spawn(async move { tx.closed().await });
        Ok(rx)
    }
}

/// A capture adapter that always yields the same frame and canvas state.
pub struct StaticCapture {
    pub bytes: Vec<u8>,
    pub canvas: Option<serde_json::Value>,
}

impl StaticCapture {
    pub fn new() -> Self {
        Self {
            bytes: vec![0x89, 0x50, 0x4e, 0x47],
            canvas: Some(serde_json::json!({
                "shapes": [{ "type": "rectangle", "text": "Start" }]
            })),
        }
    }
}

#[async_trait]
impl ScreenCapture for StaticCapture {
    fn name(&self) -> &str {
        "static"
    }

    async fn capture_frame(&self) -> Result<Option<CapturedFrame>, CaptureError> {
        Ok(Some(CapturedFrame::new("image/png", self.bytes.clone())))
    }

    async fn canvas_snapshot(&self) -> Option<serde_json::Value> {
        self.canvas.clone()
    }
}

/// A capture adapter whose frame grab always fails.
pub struct BrokenCapture;

#[async_trait]
impl ScreenCapture for BrokenCapture {
    fn name(&self) -> &str {
        "broken"
    }

    async fn capture_frame(&self) -> Result<Option<CapturedFrame>, CaptureError> {
        Err(CaptureError::FrameFailed("display stream ended".into()))
    }
}

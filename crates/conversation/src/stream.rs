//! Stream aggregation.
//!
//! A provider stream is single-pass and finite. [`StreamAggregator`] drains
//! it into one string, reporting the partial text after every non-empty
//! delta. If the consumer cancels or the provider fails part-way through,
//! whatever arrived so far is kept as the final text.

use std::time::Duration;

use futures::{Stream, StreamExt};
use sketchpal_core::error::ProviderError;
use sketchpal_core::provider::StreamChunk;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::stream_event::SessionEvent;

/// How a stream ended.
#[derive(Debug, Clone)]
pub enum StreamOutcome {
    /// The provider signalled completion or closed the stream.
    Finished,
    /// The consumer gave up.
    Cancelled,
    /// The provider failed mid-stream, or went quiet past the idle timeout.
    Failed(ProviderError),
}

impl StreamOutcome {
    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Finished)
    }
}

/// The result of draining a stream.
#[derive(Debug, Clone)]
pub struct Aggregated {
    /// Concatenation of every delivered delta
    pub text: String,
    /// Number of non-empty deltas received
    pub deltas: usize,
    pub outcome: StreamOutcome,
}

#[derive(Debug, Default)]
pub struct StreamAggregator {
    text: String,
    deltas: usize,
    progress: Option<mpsc::UnboundedSender<SessionEvent>>,
    idle_timeout: Option<Duration>,
}

impl StreamAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report a [`SessionEvent::Delta`] for every non-empty delta.
    pub fn with_progress(mut self, progress: mpsc::UnboundedSender<SessionEvent>) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Fail the stream if no chunk arrives within `timeout`.
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = Some(timeout);
        self
    }

    /// Append a delta and return the text so far. Empty deltas are ignored.
    pub fn push(&mut self, delta: &str) -> &str {
        if !delta.is_empty() {
            self.text.push_str(delta);
            self.deltas += 1;
            if let Some(tx) = &self.progress {
                // A closed progress channel only means nobody is watching
                let _ = tx.send(SessionEvent::Delta {
                    delta: delta.to_string(),
                    partial: self.text.clone(),
                });
            }
        }
        &self.text
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Drain `stream` until it finishes, fails, or `cancel` fires.
    pub async fn collect<S>(mut self, mut stream: S, cancel: &CancellationToken) -> Aggregated
    where
        S: Stream<Item = Result<StreamChunk, ProviderError>> + Unpin,
    {
        let idle_timeout = self.idle_timeout;

        let outcome = loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!(deltas = self.deltas, "Stream cancelled by consumer");
                    break StreamOutcome::Cancelled;
                }
                next = next_chunk(&mut stream, idle_timeout) => next,
            };

            match next {
                Some(Ok(chunk)) => {
                    if let Some(content) = chunk.content.as_deref() {
                        self.push(content);
                    }
                    if chunk.done {
                        break StreamOutcome::Finished;
                    }
                }
                Some(Err(e)) => {
                    warn!(error = %e, deltas = self.deltas, "Stream failed");
                    break StreamOutcome::Failed(e);
                }
                None => break StreamOutcome::Finished,
            }
        };

        Aggregated {
            text: self.text,
            deltas: self.deltas,
            outcome,
        }
    }
}

async fn next_chunk<S>(
    stream: &mut S,
    idle_timeout: Option<Duration>,
) -> Option<Result<StreamChunk, ProviderError>>
where
    S: Stream<Item = Result<StreamChunk, ProviderError>> + Unpin,
{
    match idle_timeout {
        None => stream.next().await,
        Some(limit) => match tokio::time::timeout(limit, stream.next()).await {
            Ok(item) => item,
            Err(_) => Some(Err(ProviderError::Timeout(format!(
                "no stream data for {}s",
                limit.as_secs()
            )))),
        },
    }
}

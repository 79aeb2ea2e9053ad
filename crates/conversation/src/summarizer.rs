//! Periodic conversation summaries.
//!
//! Every [`SUMMARY_INTERVAL`] appended turns, the scheduler closes a round:
//! it copies the last five turns, asks a provider for a digest, and appends
//! a [`Summary`]. Generation is best-effort. When it fails the round is
//! still recorded with placeholder text so the count of summaries always
//! tracks the log length.

use std::sync::Arc;

use chrono::Utc;
use sketchpal_core::conversation::{ConversationStore, SUMMARY_INTERVAL, Summary, Turn};
use sketchpal_core::error::SummarizationError;
use sketchpal_core::event::{DomainEvent, EventBus};
use sketchpal_core::message::PromptMessage;
use sketchpal_core::provider::{Provider, ProviderRequest};
use tracing::{debug, info, warn};

pub const SUMMARY_SYSTEM_PROMPT: &str = "You summarize conversations between a user and an AI assistant about the user's canvas diagram. Write a short digest of the exchanges below: what the user was building, what they asked, what was suggested, and any decisions made. Plain prose, at most one paragraph.";

/// Text recorded for a round whose summary could not be generated.
pub fn placeholder_text(round: u32) -> String {
    format!("Summary of conversation round {round}")
}

/// Whether a log of `len` turns closes a summary round.
pub fn is_due(len: usize) -> bool {
    len > 0 && len % SUMMARY_INTERVAL == 0
}

pub struct SummarizationScheduler {
    provider: Option<Arc<dyn Provider>>,
    model: String,
    temperature: f32,
    events: Option<Arc<EventBus>>,
}

impl SummarizationScheduler {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self {
            provider: Some(provider),
            model: model.into(),
            temperature: 0.3,
            events: None,
        }
    }

    /// A scheduler that never calls a model and records placeholders only.
    pub fn placeholder_only() -> Self {
        Self {
            provider: None,
            model: String::new(),
            temperature: 0.3,
            events: None,
        }
    }

    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    /// Close a summary round if the log length calls for one.
    ///
    /// Returns the round number of the summary appended, if any. Calling this
    /// twice at the same log length appends at most one summary.
    pub async fn check_and_trigger(&self, store: &mut dyn ConversationStore) -> Option<u32> {
        let len = store.len();
        let due_rounds = len / SUMMARY_INTERVAL;
        if !is_due(len) || store.summaries().len() >= due_rounds {
            return None;
        }

        let round = due_rounds as u32;
        let covered: Vec<Turn> = store.window(SUMMARY_INTERVAL).to_vec();

        let text = match self.generate(round, &covered).await {
            Ok(text) => text,
            Err(e) => {
                warn!(round, error = %e, "Summary generation failed, recording placeholder");
                self.publish(DomainEvent::SummarizationFailed {
                    round_number: round,
                    error_message: e.to_string(),
                    timestamp: Utc::now(),
                });
                placeholder_text(round)
            }
        };

        store.append_summary(Summary {
            round_number: round,
            created_at: Utc::now(),
            text,
            covered_turns: covered,
        });

        info!(round, turns = len, "Summary round closed");
        self.publish(DomainEvent::SummaryCreated {
            round_number: round,
            turns_covered: SUMMARY_INTERVAL,
            timestamp: Utc::now(),
        });

        Some(round)
    }

    /// Ask the provider for a digest of `turns`.
    pub async fn generate(&self, round: u32, turns: &[Turn]) -> Result<String, SummarizationError> {
        let Some(provider) = &self.provider else {
            return Ok(placeholder_text(round));
        };

        debug!(round, provider = %provider.name(), "Requesting summary");
        let text = provider
            .complete(self.request(turns))
            .await
            .map_err(|source| SummarizationError::GenerationFailed { round, source })?;

        let text = text.trim();
        if text.is_empty() {
            return Err(SummarizationError::EmptySummary { round });
        }
        Ok(text.to_string())
    }

    pub fn request(&self, turns: &[Turn]) -> ProviderRequest {
        let transcript = turns
            .iter()
            .map(|t| match t.screen_analysis.as_deref() {
                Some(analysis) => format!(
                    "User: {}\nScreen Analysis: {}\nAssistant: {}",
                    t.user_message, analysis, t.ai_response
                ),
                None => format!("User: {}\nAssistant: {}", t.user_message, t.ai_response),
            })
            .collect::<Vec<_>>()
            .join("\n\n");

        ProviderRequest::new(
            self.model.as_str(),
            vec![
                PromptMessage::system(SUMMARY_SYSTEM_PROMPT),
                PromptMessage::user(transcript.as_str()),
            ],
        )
        .with_query(transcript)
        .with_temperature(self.temperature)
    }

    fn publish(&self, event: DomainEvent) {
        if let Some(bus) = &self.events {
            bus.publish(event);
        }
    }
}

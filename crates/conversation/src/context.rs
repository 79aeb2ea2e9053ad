//! Context window assembly.
//!
//! Turns the conversation store plus the current screen context into the
//! ordered prompt a provider receives:
//!
//! 1. system role description
//! 2. latest summary framing, if any summary exists
//! 3. the last [`HISTORY_WINDOW`] turns as user/assistant pairs
//! 4. the current canvas state and query as one user message
//! 5. the fresh frame as a separate image message, if one was captured
//!
//! The order holds for every log length.

use sketchpal_core::capture::CapturedFrame;
use sketchpal_core::conversation::{ConversationStore, Turn};
use sketchpal_core::message::{ContentPart, ImageDetail, PromptMessage};

/// How many recent turns are replayed verbatim.
///
/// Smaller than the summary interval; older turns reach the model only
/// through the latest summary.
pub const HISTORY_WINDOW: usize = 3;

/// Stand-in for the canvas state when no analysis is available.
pub const NO_ANALYSIS: &str = "No canvas analysis available";

pub const SYSTEM_PROMPT: &str = "You are an AI assistant helping users with their canvas diagrams. You have access to:
1. The current state of their canvas
2. The previous conversation history
3. The latest conversation summary (if available)
4. The user's current query

Provide helpful, specific responses that take into account both the visual state of their diagram and the conversation context.
If a summary is available, use it to maintain continuity and reference previous developments.";

/// A provider-agnostic prompt plus the raw query it answers.
#[derive(Debug, Clone)]
pub struct ContextWindow {
    pub messages: Vec<PromptMessage>,
    pub query: String,
}

/// Builds [`ContextWindow`]s. Pure: reads the store, never writes it.
#[derive(Debug, Clone)]
pub struct ContextWindowBuilder {
    system_prompt: String,
    image_detail: ImageDetail,
}

impl Default for ContextWindowBuilder {
    fn default() -> Self {
        Self {
            system_prompt: SYSTEM_PROMPT.to_string(),
            image_detail: ImageDetail::High,
        }
    }
}

impl ContextWindowBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn with_image_detail(mut self, detail: ImageDetail) -> Self {
        self.image_detail = detail;
        self
    }

    pub fn build(
        &self,
        store: &dyn ConversationStore,
        screen_analysis: Option<&str>,
        frame: Option<&CapturedFrame>,
        query: &str,
    ) -> ContextWindow {
        let history = store.window(HISTORY_WINDOW);
        let mut messages = Vec::with_capacity(3 + history.len() * 2);

        messages.push(PromptMessage::system(self.system_prompt.as_str()));

        if let Some(summary) = store.latest_summary() {
            messages.push(PromptMessage::system(format!(
                "Latest Summary (Round {}):\n{}",
                summary.round_number, summary.text
            )));
        }

        for turn in history {
            messages.push(PromptMessage::user(history_entry(turn)));
            messages.push(PromptMessage::assistant(turn.ai_response.as_str()));
        }

        let canvas_state = screen_analysis
            .filter(|a| !a.trim().is_empty())
            .unwrap_or(NO_ANALYSIS);
        messages.push(PromptMessage::user(format!(
            "Current Canvas State: {canvas_state}\n\nUser Query: {query}"
        )));

        if let Some(frame) = frame {
            messages.push(PromptMessage::user_parts(vec![ContentPart::image(
                frame.to_data_url(),
                self.image_detail,
            )]));
        }

        ContextWindow {
            messages,
            query: query.to_string(),
        }
    }
}

fn history_entry(turn: &Turn) -> String {
    match turn.screen_analysis.as_deref() {
        Some(analysis) if !analysis.is_empty() => {
            format!("{}\nScreen Analysis: {}", turn.user_message, analysis)
        }
        _ => turn.user_message.clone(),
    }
}

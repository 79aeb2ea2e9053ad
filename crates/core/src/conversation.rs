//! Conversation log and summary domain types.
//!
//! The log is append-only: a [`Turn`] is pushed once its request resolves and
//! is never edited, removed, or reordered afterwards. Summaries are derived
//! from the log every [`SUMMARY_INTERVAL`] turns and are snapshots: each one
//! copies the turns it covers at the moment it is created.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::capture::CapturedFrame;

/// Number of turns covered by one summary.
pub const SUMMARY_INTERVAL: usize = 5;

/// How a turn's request resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnStatus {
    /// The provider delivered a complete answer.
    Completed,
    /// The answer was cut short (cancelled or interrupted mid-stream); the
    /// response holds whatever arrived before that.
    Partial,
    /// The request failed; the response holds the error description.
    Failed,
}

/// One user query plus its resolved assistant response and screen context.
#[derive(Debug, Clone, Serialize)]
pub struct Turn {
    /// What the user asked
    pub user_message: String,

    /// What the assistant answered (or the recorded error description)
    pub ai_response: String,

    /// When the turn was recorded
    pub created_at: DateTime<Utc>,

    /// The screen frame that accompanied the query, if any
    #[serde(skip)]
    pub screen_snapshot: Option<Arc<CapturedFrame>>,

    /// The vision analysis of that frame, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screen_analysis: Option<String>,

    /// How the request resolved
    pub status: TurnStatus,
}

impl Turn {
    fn new(user: impl Into<String>, ai: impl Into<String>, status: TurnStatus) -> Self {
        Self {
            user_message: user.into(),
            ai_response: ai.into(),
            created_at: Utc::now(),
            screen_snapshot: None,
            screen_analysis: None,
            status,
        }
    }

    /// A turn whose answer arrived in full.
    pub fn completed(user: impl Into<String>, ai: impl Into<String>) -> Self {
        Self::new(user, ai, TurnStatus::Completed)
    }

    /// A turn whose answer was cut short.
    pub fn partial(user: impl Into<String>, ai: impl Into<String>) -> Self {
        Self::new(user, ai, TurnStatus::Partial)
    }

    /// A turn whose request failed; `description` is shown in place of an answer.
    pub fn failed(user: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(user, description, TurnStatus::Failed)
    }

    /// Attach the screen context that was current when the query was sent.
    pub fn with_screen(
        mut self,
        snapshot: Option<Arc<CapturedFrame>>,
        analysis: Option<String>,
    ) -> Self {
        self.screen_snapshot = snapshot;
        self.screen_analysis = analysis;
        self
    }

    pub fn is_failed(&self) -> bool {
        self.status == TurnStatus::Failed
    }
}

/// A compressed digest of [`SUMMARY_INTERVAL`] consecutive turns.
#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    /// 1-based round index; the K-th summary has round K
    pub round_number: u32,

    /// When the summary was created
    pub created_at: DateTime<Utc>,

    /// The digest text
    pub text: String,

    /// Copies of the turns this summary was derived from
    pub covered_turns: Vec<Turn>,
}

/// The append-only turn log plus its derived summaries.
///
/// The orchestration flow is the only writer. Nothing in the trait lets a
/// caller remove or rewrite an entry.
pub trait ConversationStore: Send + Sync {
    /// Append a turn. Always succeeds.
    fn append(&mut self, turn: Turn);

    /// Append a summary.
    fn append_summary(&mut self, summary: Summary);

    /// All turns, oldest first.
    fn turns(&self) -> &[Turn];

    /// All summaries, oldest first.
    fn summaries(&self) -> &[Summary];

    /// The most recent summary, if any.
    fn latest_summary(&self) -> Option<&Summary> {
        self.summaries().last()
    }

    /// The last `n` turns in chronological order (all of them if fewer exist).
    fn window(&self, n: usize) -> &[Turn] {
        let turns = self.turns();
        &turns[turns.len().saturating_sub(n)..]
    }

    /// Number of turns in the log.
    fn len(&self) -> usize {
        self.turns().len()
    }

    fn is_empty(&self) -> bool {
        self.turns().is_empty()
    }
}

/// A process-lifetime store that keeps everything in memory.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    turns: Vec<Turn>,
    summaries: Vec<Summary>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ConversationStore for InMemoryStore {
    fn append(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    fn append_summary(&mut self, summary: Summary) {
        self.summaries.push(summary);
    }

    fn turns(&self) -> &[Turn] {
        &self.turns
    }

    fn summaries(&self) -> &[Summary] {
        &self.summaries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with(n: usize) -> InMemoryStore {
        let mut store = InMemoryStore::new();
        for i in 1..=n {
            store.append(Turn::completed(format!("q{i}"), format!("a{i}")));
        }
        store
    }

    #[test]
    fn window_returns_most_recent_in_order() {
        let store = store_with(7);
        let window = store.window(3);
        let users: Vec<_> = window.iter().map(|t| t.user_message.as_str()).collect();
        assert_eq!(users, vec!["q5", "q6", "q7"]);
    }

    #[test]
    fn window_larger_than_log_returns_everything() {
        let store = store_with(2);
        assert_eq!(store.window(3).len(), 2);
        assert_eq!(store.window(3)[0].user_message, "q1");
        assert!(InMemoryStore::new().window(3).is_empty());
    }

    #[test]
    fn latest_summary_tracks_last_append() {
        let mut store = store_with(5);
        assert!(store.latest_summary().is_none());

        store.append_summary(Summary {
            round_number: 1,
            created_at: Utc::now(),
            text: "first round".into(),
            covered_turns: store.window(SUMMARY_INTERVAL).to_vec(),
        });
        assert_eq!(store.latest_summary().unwrap().round_number, 1);
        assert_eq!(store.latest_summary().unwrap().covered_turns.len(), 5);
    }

    #[test]
    fn turn_constructors_set_status() {
        assert_eq!(Turn::completed("q", "a").status, TurnStatus::Completed);
        assert_eq!(Turn::partial("q", "a").status, TurnStatus::Partial);
        assert!(Turn::failed("q", "boom").is_failed());
    }

    #[test]
    fn turn_serialization_skips_snapshot() {
        let turn = Turn::completed("q", "a").with_screen(None, Some("a circle".into()));
        let json = serde_json::to_value(&turn).unwrap();
        assert_eq!(json["screen_analysis"], "a circle");
        assert_eq!(json["status"], "completed");
        assert!(json.get("screen_snapshot").is_none());
    }
}

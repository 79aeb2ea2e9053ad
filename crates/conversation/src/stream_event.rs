//! Session-level progress events.
//!
//! `SessionEvent` reports what a send is doing while it runs so an embedding
//! UI can render live progress:
//! - `analysis_started` / `analysis_finished`: screen analysis around a send
//! - `delta`: a new piece of answer text plus the text so far
//! - `turn_recorded`: the turn was appended to the log
//! - `summary_created`: a summary round closed
//! - `error`: a request failed

use serde::{Deserialize, Serialize};
use sketchpal_core::conversation::TurnStatus;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// A frame was captured and is being analyzed.
    AnalysisStarted,

    /// Screen analysis resolved; `analysis` is `None` if it failed.
    AnalysisFinished { analysis: Option<String> },

    /// A non-empty text delta arrived.
    Delta { delta: String, partial: String },

    /// The turn landed in the log at `index`.
    TurnRecorded { index: usize, status: TurnStatus },

    /// A summary was appended.
    SummaryCreated { round_number: u32 },

    /// A request failed.
    Error { message: String },
}

impl SessionEvent {
    /// Event name, matching the serialized `type` tag.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::AnalysisStarted => "analysis_started",
            Self::AnalysisFinished { .. } => "analysis_finished",
            Self::Delta { .. } => "delta",
            Self::TurnRecorded { .. } => "turn_recorded",
            Self::SummaryCreated { .. } => "summary_created",
            Self::Error { .. } => "error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delta_serialization() {
        let event = SessionEvent::Delta {
            delta: "lo".into(),
            partial: "Hello".into(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"delta""#));
        assert!(json.contains(r#""partial":"Hello""#));
    }

    #[test]
    fn turn_recorded_serialization() {
        let event = SessionEvent::TurnRecorded {
            index: 4,
            status: TurnStatus::Partial,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"turn_recorded""#));
        assert!(json.contains(r#""status":"partial""#));
    }

    #[test]
    fn event_type_matches_tag() {
        let events = [
            SessionEvent::AnalysisStarted,
            SessionEvent::AnalysisFinished { analysis: None },
            SessionEvent::Delta {
                delta: "a".into(),
                partial: "a".into(),
            },
            SessionEvent::TurnRecorded {
                index: 0,
                status: TurnStatus::Completed,
            },
            SessionEvent::SummaryCreated { round_number: 1 },
            SessionEvent::Error {
                message: "x".into(),
            },
        ];
        for event in events {
            let json = serde_json::to_value(&event).unwrap();
            assert_eq!(json["type"], event.event_type());
        }
    }

    #[test]
    fn deserialization() {
        let event: SessionEvent =
            serde_json::from_str(r#"{"type":"summary_created","round_number":2}"#).unwrap();
        assert!(matches!(event, SessionEvent::SummaryCreated { round_number: 2 }));
    }
}

//! Conversation orchestration for SketchPal.
//!
//! A send follows a **capture → assemble → ask → record** cycle:
//!
//! 1. **Capture** a frame and canvas state, and analyze it (optional)
//! 2. **Assemble** the context window: summary, recent turns, current query
//! 3. **Ask** the chat provider, aggregating streamed deltas
//! 4. **Record** the turn, then close a summary round every fifth turn
//!
//! [`ChatSession`] drives the cycle; the other modules are its parts.

pub mod analysis;
pub mod context;
pub mod session;
pub mod stream;
pub mod stream_event;
pub mod summarizer;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use analysis::ScreenAnalyzer;
pub use context::{ContextWindow, ContextWindowBuilder, HISTORY_WINDOW};
pub use session::{ChatSession, ChatSettings, SendError, SendOutcome, error_description};
pub use stream::{Aggregated, StreamAggregator, StreamOutcome};
pub use stream_event::SessionEvent;
pub use summarizer::SummarizationScheduler;

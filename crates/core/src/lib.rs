//! # SketchPal Core
//!
//! Domain types, traits, and error definitions for the SketchPal canvas
//! assistant. This crate has **zero framework dependencies**. It defines the
//! domain model that the provider and conversation crates implement against.
//!
//! ## Design Philosophy
//!
//! Every collaborator of the conversation engine is a trait here:
//! - [`Provider`]: a language-model backend (hosted or custom HTTP)
//! - [`ConversationStore`]: the append-only turn log and its summaries
//! - [`ScreenCapture`]: the external screen/canvas capture adapter
//!
//! Implementations live in their respective crates, so tests can swap in
//! scripted stubs.

pub mod capture;
pub mod conversation;
pub mod error;
pub mod event;
pub mod message;
pub mod provider;

// Re-export key types at crate root for ergonomics
pub use capture::{AnalysisPreset, CaptureSource, CapturedFrame, ScreenCapture};
pub use conversation::{ConversationStore, InMemoryStore, Summary, Turn, TurnStatus};
pub use error::{CaptureError, Error, ProviderError, Result, SummarizationError};
pub use event::{DomainEvent, EventBus};
pub use message::{ContentPart, ImageDetail, ImageUrl, MessageContent, PromptMessage, Role};
pub use provider::{ChunkReceiver, Provider, ProviderRequest, StreamChunk, Usage};

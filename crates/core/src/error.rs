//! Error types for the SketchPal domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for all SketchPal operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Capture errors ---
    #[error("Capture error: {0}")]
    Capture(#[from] CaptureError),

    // --- Summarization errors ---
    #[error("Summarization error: {0}")]
    Summarization(#[from] SummarizationError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError {
        status_code: u16,
        message: String,
    },

    #[error("Invalid provider response: {0}")]
    InvalidResponse(String),

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

impl ProviderError {
    /// The provider cannot be used at all (missing credential or endpoint).
    ///
    /// These abort a send before anything is recorded; every other variant
    /// is a per-request failure that still leaves a turn in the log.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::NotConfigured(_))
    }

    /// Transport-level failure: the request never produced a response.
    pub fn is_network(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Timeout(_))
    }
}

#[derive(Debug, Clone, Error)]
pub enum CaptureError {
    #[error("Screen capture unavailable")]
    Unavailable,

    #[error("Screen capture failed: {0}")]
    FrameFailed(String),

    #[error("Screen analysis aborted")]
    Aborted,

    #[error("Screen analysis failed: {0}")]
    AnalysisFailed(#[from] ProviderError),
}

#[derive(Debug, Clone, Error)]
pub enum SummarizationError {
    #[error("Summary generation failed for round {round}: {source}")]
    GenerationFailed {
        round: u32,
        #[source]
        source: ProviderError,
    },

    #[error("Summary for round {round} came back empty")]
    EmptySummary { round: u32 },
}

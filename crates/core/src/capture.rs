//! Screen capture contract: the external adapter the engine consumes.
//!
//! The engine never starts or stops a capture session. When a turn is being
//! built it asks the injected [`CaptureSource`] for one still frame and the
//! canvas state, and hands both to a vision provider for analysis.

use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CaptureError;

/// A still frame of the user's workspace.
#[derive(Clone)]
pub struct CapturedFrame {
    /// Opaque handle for this frame
    pub id: String,

    /// Image MIME type (e.g., "image/jpeg")
    pub mime_type: String,

    /// Encoded image bytes
    pub bytes: Vec<u8>,

    /// When the frame was taken
    pub captured_at: DateTime<Utc>,
}

impl CapturedFrame {
    pub fn new(mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            mime_type: mime_type.into(),
            bytes,
            captured_at: Utc::now(),
        }
    }

    /// Encode the frame as a `data:` URL for image message parts.
    pub fn to_data_url(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.mime_type,
            base64::engine::general_purpose::STANDARD.encode(&self.bytes)
        )
    }
}

impl std::fmt::Debug for CapturedFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapturedFrame")
            .field("id", &self.id)
            .field("mime_type", &self.mime_type)
            .field("bytes", &self.bytes.len())
            .field("captured_at", &self.captured_at)
            .finish()
    }
}

/// The capture adapter the embedding application provides.
#[async_trait]
pub trait ScreenCapture: Send + Sync {
    /// Adapter name for logs.
    fn name(&self) -> &str;

    /// Grab the current frame. `Ok(None)` means sharing is active but no frame
    /// is ready yet.
    async fn capture_frame(&self) -> std::result::Result<Option<CapturedFrame>, CaptureError>;

    /// The editor's current document state, serialized, if the editor exposes one.
    async fn canvas_snapshot(&self) -> Option<serde_json::Value> {
        None
    }
}

/// Where screen context comes from for this session.
#[derive(Clone, Default)]
pub enum CaptureSource {
    /// No capture adapter is present; turns are sent without screen context.
    #[default]
    Unavailable,
    /// An adapter is present and may yield frames.
    Available(Arc<dyn ScreenCapture>),
}

impl CaptureSource {
    pub fn available(adapter: Arc<dyn ScreenCapture>) -> Self {
        Self::Available(adapter)
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Self::Available(_))
    }

    /// Grab a frame and the canvas state, if an adapter is present.
    pub async fn grab(
        &self,
    ) -> std::result::Result<Option<(CapturedFrame, Option<serde_json::Value>)>, CaptureError> {
        let Self::Available(adapter) = self else {
            return Ok(None);
        };
        match adapter.capture_frame().await? {
            Some(frame) => Ok(Some((frame, adapter.canvas_snapshot().await))),
            None => Ok(None),
        }
    }
}

impl std::fmt::Debug for CaptureSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unavailable => write!(f, "Unavailable"),
            Self::Available(adapter) => write!(f, "Available({})", adapter.name()),
        }
    }
}

/// What the vision model should focus on when looking at a frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisPreset {
    #[default]
    General,
    Layout,
    TextContent,
    VisualElements,
    Purpose,
}

impl AnalysisPreset {
    pub const ALL: [AnalysisPreset; 5] = [
        Self::General,
        Self::Layout,
        Self::TextContent,
        Self::VisualElements,
        Self::Purpose,
    ];

    /// The prompt sent alongside the frame.
    pub fn prompt(&self) -> &'static str {
        match self {
            Self::General => "What do you see in the canvas? Ignore the UI, the chat, the tabs and other unwanted elements; only describe what is in the canvas.",
            Self::Layout => "Describe the layout and UI elements visible in this screenshot.",
            Self::TextContent => "What text content is visible in this screenshot? Please list all readable text.",
            Self::VisualElements => "Are there any images, icons, or visual elements in this screenshot? Please describe them.",
            Self::Purpose => "What is the main purpose or function of what's shown in this screenshot?",
        }
    }

    /// Human-readable label shown in pickers.
    pub fn description(&self) -> &'static str {
        match self {
            Self::General => "General analysis of the screen content",
            Self::Layout => "UI/UX analysis",
            Self::TextContent => "Text content analysis",
            Self::VisualElements => "Visual elements analysis",
            Self::Purpose => "Purpose analysis",
        }
    }

    /// Look a preset up by its description; unknown descriptions fall back to
    /// [`AnalysisPreset::General`].
    pub fn from_description(description: &str) -> Self {
        Self::ALL
            .into_iter()
            .find(|p| p.description() == description)
            .unwrap_or_default()
    }

    /// All descriptions, in picker order.
    pub fn descriptions() -> Vec<&'static str> {
        Self::ALL.iter().map(|p| p.description()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StaticCapture {
        frame: Option<Vec<u8>>,
    }

    #[async_trait]
    impl ScreenCapture for StaticCapture {
        fn name(&self) -> &str {
            "static"
        }

        async fn capture_frame(&self) -> std::result::Result<Option<CapturedFrame>, CaptureError> {
            Ok(self.frame.clone().map(|b| CapturedFrame::new("image/png", b)))
        }

        async fn canvas_snapshot(&self) -> Option<serde_json::Value> {
            Some(serde_json::json!({"shapes": []}))
        }
    }

    #[test]
    fn data_url_encoding() {
        let frame = CapturedFrame::new("image/jpeg", vec![0xff, 0xd8, 0xff]);
        assert_eq!(frame.to_data_url(), "data:image/jpeg;base64,/9j/");
    }

    #[test]
    fn preset_lookup_falls_back_to_general() {
        assert_eq!(AnalysisPreset::from_description("UI/UX analysis"), AnalysisPreset::Layout);
        assert_eq!(AnalysisPreset::from_description("nonsense"), AnalysisPreset::General);
        assert_eq!(AnalysisPreset::descriptions().len(), 5);
    }

    #[tokio::test]
    async fn unavailable_source_yields_nothing() {
        let source = CaptureSource::Unavailable;
        assert!(!source.is_available());
        assert!(source.grab().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn available_source_returns_frame_and_snapshot() {
        let source = CaptureSource::available(Arc::new(StaticCapture {
            frame: Some(vec![1, 2, 3]),
        }));
        let (frame, snapshot) = source.grab().await.unwrap().unwrap();
        assert_eq!(frame.bytes, vec![1, 2, 3]);
        assert!(snapshot.is_some());
    }

    #[tokio::test]
    async fn available_source_without_frame() {
        let source = CaptureSource::available(Arc::new(StaticCapture { frame: None }));
        assert!(source.grab().await.unwrap().is_none());
    }
}

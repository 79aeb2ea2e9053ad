//! Screen analysis through a vision-capable provider.
//!
//! A captured frame and the editor's document state go out as one multimodal
//! request; the streamed reply becomes the turn's screen analysis.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use sketchpal_core::capture::{AnalysisPreset, CapturedFrame};
use sketchpal_core::error::{CaptureError, ProviderError};
use sketchpal_core::message::{ContentPart, ImageDetail, PromptMessage};
use sketchpal_core::provider::{Provider, ProviderRequest};
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::stream::{StreamAggregator, StreamOutcome};

pub const VISION_SYSTEM_PROMPT: &str = "You are an AI assistant specialized in analyzing the content of a drawing canvas. Your sole task is to identify and describe the shapes, text, and overall structure of the diagram presented in the image.

**Ignore every element that is not part of the canvas itself.** This includes operating system UI, browser chrome, and anything outside the drawing area. Focus exclusively on the user's drawing.

Based on the image and the accompanying canvas shape data, extract:

1. **Overall Diagram Type:** flowchart, mind map, circuit diagram, geometry sketch, freeform drawing, equation setup, or \"Unclear/Mixed\".

2. **Key Elements:**
   * Distinct text labels and their approximate locations
   * Geometric shapes (circles, rectangles, diamonds) and their labels
   * Connectors (arrows, lines) and the shapes they join

3. **Inferred Relationships/Structure:** how the elements connect or relate spatially.

4. **Completeness/Status Assessment:** whether the diagram looks complete for its type, in progress, or has missing or misplaced elements.

Respond concisely in a structured JSON format, adhering strictly to the canvas content.";

/// Runs vision requests for captured frames.
pub struct ScreenAnalyzer {
    provider: Arc<dyn Provider>,
    model: String,
    temperature: f32,
    image_detail: ImageDetail,
    idle_timeout: Option<Duration>,
}

impl ScreenAnalyzer {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature: 0.7,
            image_detail: ImageDetail::High,
            idle_timeout: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_image_detail(mut self, detail: ImageDetail) -> Self {
        self.image_detail = detail;
        self
    }

    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = Some(timeout);
        self
    }

    /// The vision request for one frame.
    pub fn request(
        &self,
        frame: &CapturedFrame,
        canvas: Option<&Value>,
        preset: AnalysisPreset,
    ) -> ProviderRequest {
        let mut parts = vec![
            ContentPart::text(preset.prompt()),
            ContentPart::image(frame.to_data_url(), self.image_detail),
        ];
        if let Some(canvas) = canvas {
            parts.push(ContentPart::text(format!("Canvas JSON Data: {canvas}")));
        }

        ProviderRequest::new(
            self.model.as_str(),
            vec![
                PromptMessage::system(VISION_SYSTEM_PROMPT),
                PromptMessage::user_parts(parts),
            ],
        )
        .with_query(preset.prompt())
        .with_temperature(self.temperature)
    }

    /// Analyze a frame. Cancelling `cancel` at any point yields
    /// [`CaptureError::Aborted`] and discards any partial analysis.
    pub async fn analyze(
        &self,
        frame: &CapturedFrame,
        canvas: Option<&Value>,
        preset: AnalysisPreset,
        cancel: &CancellationToken,
    ) -> Result<String, CaptureError> {
        let request = self.request(frame, canvas, preset);
        debug!(frame = %frame.id, ?preset, provider = %self.provider.name(), "Analyzing frame");

        let rx = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(CaptureError::Aborted),
            rx = self.provider.stream(request) => rx?,
        };

        let mut aggregator = StreamAggregator::new();
        if let Some(timeout) = self.idle_timeout {
            aggregator = aggregator.with_idle_timeout(timeout);
        }
        let result = aggregator.collect(ReceiverStream::new(rx), cancel).await;

        match result.outcome {
            StreamOutcome::Cancelled => Err(CaptureError::Aborted),
            StreamOutcome::Failed(e) => Err(CaptureError::AnalysisFailed(e)),
            StreamOutcome::Finished if result.text.trim().is_empty() => {
                Err(CaptureError::AnalysisFailed(ProviderError::InvalidResponse(
                    "vision model returned no analysis".into(),
                )))
            }
            StreamOutcome::Finished => {
                info!(frame = %frame.id, chars = result.text.len(), "Frame analyzed");
                Ok(result.text)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{FailingProvider, ScriptedProvider, StallingProvider};
    use sketchpal_core::message::{MessageContent, Role};

    fn frame() -> CapturedFrame {
        CapturedFrame::new("image/jpeg", vec![0xff, 0xd8])
    }

    #[test]
    fn request_layout() {
        let analyzer = ScreenAnalyzer::new(Arc::new(ScriptedProvider::new(vec![])), "gpt-4.1-mini")
            .with_image_detail(ImageDetail::High);
        let canvas = serde_json::json!({ "shapes": [{ "type": "geo" }] });

        let req = analyzer.request(&frame(), Some(&canvas), AnalysisPreset::TextContent);

        assert_eq!(req.model, "gpt-4.1-mini");
        assert_eq!(req.messages.len(), 2);
        assert_eq!(req.messages[0].role, Role::System);
        assert_eq!(req.messages[0].text(), VISION_SYSTEM_PROMPT);

        let MessageContent::Parts(parts) = &req.messages[1].content else {
            panic!("expected parts");
        };
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], ContentPart::text(AnalysisPreset::TextContent.prompt()));
        assert!(matches!(
            &parts[1],
            ContentPart::ImageUrl { image_url } if image_url.url.starts_with("data:image/jpeg;base64,")
                && image_url.detail == ImageDetail::High
        ));
        assert_eq!(
            parts[2],
            ContentPart::text(r#"Canvas JSON Data: {"shapes":[{"type":"geo"}]}"#)
        );
    }

    #[test]
    fn request_without_canvas_state_has_two_parts() {
        let analyzer = ScreenAnalyzer::new(Arc::new(ScriptedProvider::new(vec![])), "m");
        let req = analyzer.request(&frame(), None, AnalysisPreset::General);
        let MessageContent::Parts(parts) = &req.messages[1].content else {
            panic!("expected parts");
        };
        assert_eq!(parts.len(), 2);
    }

    #[tokio::test]
    async fn analyze_returns_streamed_text() {
        let provider = Arc::new(ScriptedProvider::streaming(vec![vec!["A flow", "chart"]]));
        let analyzer = ScreenAnalyzer::new(provider.clone(), "m");

        let text = analyzer
            .analyze(&frame(), None, AnalysisPreset::General, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(text, "A flowchart");
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn analyze_maps_provider_failure() {
        let analyzer = ScreenAnalyzer::new(
            Arc::new(FailingProvider::new(ProviderError::Network("offline".into()))),
            "m",
        );
        let err = analyzer
            .analyze(&frame(), None, AnalysisPreset::General, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, CaptureError::AnalysisFailed(ProviderError::Network(_))));
    }

    #[tokio::test]
    async fn cancelled_analysis_is_aborted() {
        let analyzer = ScreenAnalyzer::new(Arc::new(StallingProvider::new(vec!["half an "])), "m");
        let cancel = CancellationToken::new();

        let task = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                analyzer
                    .analyze(&frame(), None, AnalysisPreset::General, &cancel)
                    .await
            })
        };
        tokio::task::yield_now().await;
        cancel.cancel();

        assert!(matches!(task.await.unwrap(), Err(CaptureError::Aborted)));
    }

    #[tokio::test]
    async fn empty_analysis_is_an_error() {
        let analyzer =
            ScreenAnalyzer::new(Arc::new(ScriptedProvider::streaming(vec![vec![]])), "m");
        let err = analyzer
            .analyze(&frame(), None, AnalysisPreset::General, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CaptureError::AnalysisFailed(ProviderError::InvalidResponse(_))
        ));
    }
}

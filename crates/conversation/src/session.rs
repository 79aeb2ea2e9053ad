//! Send orchestration.
//!
//! A [`ChatSession`] owns the conversation store and runs one send at a time:
//!
//! 1. grab a frame and canvas state from the capture source, if any
//! 2. analyze the frame with the vision provider
//! 3. build the context window
//! 4. ask the chat provider, streaming or not
//! 5. append the resulting turn and close a summary round if one is due
//!
//! Capture and summary failures never fail a send. Stopping capture while a
//! frame is being analyzed drops the analysis and the send carries on without
//! it. Provider failures still record a turn so the log shows that the
//! attempt happened. A provider that cannot be used at all, or a send
//! cancelled before any answer text arrived, leaves the log untouched.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use sketchpal_config::{AppConfig, ProviderConfig};
use sketchpal_core::capture::{AnalysisPreset, CaptureSource, CapturedFrame};
use sketchpal_core::conversation::{ConversationStore, InMemoryStore, Turn, TurnStatus};
use sketchpal_core::error::{CaptureError, ProviderError};
use sketchpal_core::event::{DomainEvent, EventBus};
use sketchpal_core::message::ImageDetail;
use sketchpal_core::provider::{Provider, ProviderRequest};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::analysis::ScreenAnalyzer;
use crate::context::ContextWindowBuilder;
use crate::stream::{StreamAggregator, StreamOutcome};
use crate::stream_event::SessionEvent;
use crate::summarizer::SummarizationScheduler;

/// User label recorded for analysis-only turns.
pub const ANALYSIS_TURN_LABEL: &str = "Screen Analysis";

/// Errors that stop a send before anything is recorded.
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    #[error("Message is empty")]
    EmptyQuery,

    #[error("Provider is not configured: {0}")]
    Configuration(#[source] ProviderError),

    #[error("Send cancelled before any answer arrived")]
    Cancelled,
}

/// The assistant-visible text recorded when a request fails.
pub fn error_description(error: &ProviderError) -> String {
    format!("Sorry, there was an error processing your message: {error}")
}

/// Model and request settings for a session.
#[derive(Debug, Clone)]
pub struct ChatSettings {
    pub model: String,
    pub vision_model: String,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    pub streaming: bool,
    pub image_detail: ImageDetail,
    pub analysis_preset: AnalysisPreset,
    pub idle_timeout: Option<Duration>,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            model: "gpt-4.1-mini".into(),
            vision_model: "gpt-4.1-mini".into(),
            temperature: 0.7,
            max_tokens: None,
            streaming: true,
            image_detail: ImageDetail::High,
            analysis_preset: AnalysisPreset::General,
            idle_timeout: None,
        }
    }
}

impl ChatSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        let chat: &ProviderConfig = config.chat_provider();
        Self {
            model: chat.model.clone(),
            vision_model: config.vision_provider().model.clone(),
            temperature: chat.temperature,
            max_tokens: chat.max_tokens,
            streaming: chat.streaming,
            image_detail: config.capture.image_detail,
            analysis_preset: config.capture.analysis_preset,
            idle_timeout: (config.stream_idle_timeout_secs > 0)
                .then(|| Duration::from_secs(config.stream_idle_timeout_secs)),
        }
    }
}

/// What a send (or analysis) produced.
#[derive(Debug, Clone)]
pub struct SendOutcome {
    /// The text recorded as the turn's response
    pub response: String,
    pub status: TurnStatus,
    /// The provider error behind a failed or partial turn
    pub error: Option<ProviderError>,
    pub screen_analysis: Option<String>,
    /// Index of the recorded turn in the log
    pub turn_index: usize,
    /// Round number of the summary this turn closed, if any
    pub summary_round: Option<u32>,
}

/// A single conversation with its store, providers, and capture source.
pub struct ChatSession {
    store: Box<dyn ConversationStore>,
    provider: Arc<dyn Provider>,
    vision: Option<Arc<dyn Provider>>,
    capture: CaptureSource,
    settings: ChatSettings,
    builder: ContextWindowBuilder,
    summarizer: SummarizationScheduler,
    events: Arc<EventBus>,
    progress: Option<mpsc::UnboundedSender<SessionEvent>>,
    capture_stop: CancellationToken,
}

impl ChatSession {
    /// A session with an in-memory store and no screen capture. Summaries
    /// are generated by the chat provider.
    pub fn new(provider: Arc<dyn Provider>, settings: ChatSettings) -> Self {
        let events = Arc::new(EventBus::default());
        let summarizer = SummarizationScheduler::new(provider.clone(), settings.model.as_str())
            .with_events(events.clone());
        let builder = ContextWindowBuilder::new().with_image_detail(settings.image_detail);

        Self {
            store: Box::new(InMemoryStore::new()),
            provider,
            vision: None,
            capture: CaptureSource::Unavailable,
            settings,
            builder,
            summarizer,
            events,
            progress: None,
            capture_stop: CancellationToken::new(),
        }
    }

    /// Build a session from application configuration.
    pub fn from_config(config: &AppConfig, capture: CaptureSource) -> Result<Self, SendError> {
        let providers = sketchpal_providers::build_from_config(config).map_err(|e| {
            warn!(error = %e, "Chat provider unavailable");
            SendError::Configuration(e)
        })?;

        let mut session = Self::new(providers.chat, ChatSettings::from_config(config))
            .with_capture(capture);
        if let Some(vision) = providers.vision {
            session = session.with_vision(vision);
        }
        Ok(session)
    }

    pub fn with_store(mut self, store: Box<dyn ConversationStore>) -> Self {
        self.store = store;
        self
    }

    pub fn with_capture(mut self, capture: CaptureSource) -> Self {
        self.capture = capture;
        self
    }

    /// Provider used to analyze captured frames.
    pub fn with_vision(mut self, vision: Arc<dyn Provider>) -> Self {
        self.vision = Some(vision);
        self
    }

    pub fn with_summarizer(mut self, summarizer: SummarizationScheduler) -> Self {
        self.summarizer = summarizer.with_events(self.events.clone());
        self
    }

    pub fn with_context_builder(mut self, builder: ContextWindowBuilder) -> Self {
        self.builder = builder;
        self
    }

    /// Receive live [`SessionEvent`]s while sends run.
    pub fn with_progress(mut self, progress: mpsc::UnboundedSender<SessionEvent>) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn store(&self) -> &dyn ConversationStore {
        self.store.as_ref()
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    pub fn settings(&self) -> &ChatSettings {
        &self.settings
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Whether sends will carry screen context.
    pub fn can_analyze(&self) -> bool {
        self.capture_active() && self.vision.is_some()
    }

    /// Token that stops screen capture. Cancelling it aborts an analysis in
    /// flight, and later sends go out without screen context until
    /// [`resume_capture`](Self::resume_capture) is called. The send itself
    /// is not cancelled.
    pub fn capture_stop(&self) -> CancellationToken {
        self.capture_stop.clone()
    }

    /// Start capturing again after a stop.
    pub fn resume_capture(&mut self) {
        if self.capture_stop.is_cancelled() {
            self.capture_stop = CancellationToken::new();
        }
    }

    fn capture_active(&self) -> bool {
        self.capture.is_available() && !self.capture_stop.is_cancelled()
    }

    /// Send a user query and record the resulting turn.
    pub async fn handle_send(
        &mut self,
        query: &str,
        cancel: &CancellationToken,
    ) -> Result<SendOutcome, SendError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(SendError::EmptyQuery);
        }

        let (frame, analysis) = self.screen_context(cancel).await;

        if cancel.is_cancelled() {
            info!("Send cancelled before the request went out");
            return Err(SendError::Cancelled);
        }

        let window = self.builder.build(
            self.store.as_ref(),
            analysis.as_deref(),
            frame.as_deref(),
            query,
        );
        let mut request = ProviderRequest::new(self.settings.model.as_str(), window.messages)
            .with_query(window.query)
            .with_temperature(self.settings.temperature)
            .with_max_tokens(self.settings.max_tokens);
        request.stream = self.settings.streaming;

        debug!(
            provider = %self.provider.name(),
            messages = request.messages.len(),
            streaming = request.stream,
            "Dispatching chat request"
        );

        let answer = if self.settings.streaming {
            self.stream_answer(request, cancel).await
        } else {
            self.complete_answer(request, cancel).await
        };
        let answer = match answer {
            Ok(Some(answer)) => answer,
            Ok(None) => {
                info!("Send cancelled before any answer arrived; nothing recorded");
                return Err(SendError::Cancelled);
            }
            Err(e) if e.is_configuration() => {
                warn!(error = %e, "Chat provider is not configured; nothing recorded");
                return Err(SendError::Configuration(e));
            }
            Err(e) => Answer::failed(e),
        };

        if let Some(e) = &answer.error {
            self.report_error("chat request", e);
        }

        let turn = match answer.status {
            TurnStatus::Completed => Turn::completed(query, answer.text.as_str()),
            TurnStatus::Partial => Turn::partial(query, answer.text.as_str()),
            TurnStatus::Failed => Turn::failed(query, answer.text.as_str()),
        }
        .with_screen(frame, analysis.clone());

        let turn_index = self.record(turn);
        let summary_round = self.close_summary_round().await;

        Ok(SendOutcome {
            response: answer.text,
            status: answer.status,
            error: answer.error,
            screen_analysis: analysis,
            turn_index,
            summary_round,
        })
    }

    /// Analyze the current screen without a user query and record the
    /// analysis as its own turn. An aborted or failed analysis records
    /// nothing.
    pub async fn analyze_screen(
        &mut self,
        preset: Option<AnalysisPreset>,
        cancel: &CancellationToken,
    ) -> Result<SendOutcome, CaptureError> {
        let analyzer = self.analyzer().ok_or(CaptureError::Unavailable)?;
        let (frame, canvas) = self
            .capture
            .grab()
            .await?
            .ok_or_else(|| CaptureError::FrameFailed("no frame available yet".into()))?;
        let preset = preset.unwrap_or(self.settings.analysis_preset);

        self.emit(SessionEvent::AnalysisStarted);
        let analysis = match self
            .run_analysis(&analyzer, &frame, canvas.as_ref(), preset, cancel)
            .await
        {
            Ok(analysis) => analysis,
            Err(e) => {
                self.emit(SessionEvent::AnalysisFinished { analysis: None });
                self.report_capture_failure(&e);
                return Err(e);
            }
        };
        self.emit(SessionEvent::AnalysisFinished {
            analysis: Some(analysis.clone()),
        });

        let turn = Turn::completed(ANALYSIS_TURN_LABEL, analysis.as_str())
            .with_screen(Some(Arc::new(frame)), Some(analysis.clone()));
        let turn_index = self.record(turn);
        let summary_round = self.close_summary_round().await;

        Ok(SendOutcome {
            response: analysis.clone(),
            status: TurnStatus::Completed,
            error: None,
            screen_analysis: Some(analysis),
            turn_index,
            summary_round,
        })
    }

    fn analyzer(&self) -> Option<ScreenAnalyzer> {
        if !self.capture_active() {
            return None;
        }
        let vision = self.vision.clone()?;
        let mut analyzer = ScreenAnalyzer::new(vision, self.settings.vision_model.as_str())
            .with_temperature(self.settings.temperature)
            .with_image_detail(self.settings.image_detail);
        if let Some(timeout) = self.settings.idle_timeout {
            analyzer = analyzer.with_idle_timeout(timeout);
        }
        Some(analyzer)
    }

    /// Analysis that ends early when either the caller or a capture stop
    /// cancels it.
    async fn run_analysis(
        &self,
        analyzer: &ScreenAnalyzer,
        frame: &CapturedFrame,
        canvas: Option<&serde_json::Value>,
        preset: AnalysisPreset,
        cancel: &CancellationToken,
    ) -> Result<String, CaptureError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(CaptureError::Aborted),
            result = analyzer.analyze(frame, canvas, preset, &self.capture_stop) => result,
        }
    }

    /// Frame and analysis for the turn being built. Failures and aborts
    /// degrade to "no screen context" rather than failing the send.
    async fn screen_context(
        &self,
        cancel: &CancellationToken,
    ) -> (Option<Arc<CapturedFrame>>, Option<String>) {
        if !self.capture_active() {
            return (None, None);
        }
        let (frame, canvas) = match self.capture.grab().await {
            Ok(Some(grabbed)) => grabbed,
            Ok(None) => return (None, None),
            Err(e) => {
                self.report_capture_failure(&e);
                return (None, None);
            }
        };
        let frame = Arc::new(frame);

        let Some(analyzer) = self.analyzer() else {
            return (Some(frame), None);
        };

        self.emit(SessionEvent::AnalysisStarted);
        let preset = self.settings.analysis_preset;
        let analysis = match self
            .run_analysis(&analyzer, &frame, canvas.as_ref(), preset, cancel)
            .await
        {
            Ok(analysis) => Some(analysis),
            Err(e) => {
                self.report_capture_failure(&e);
                None
            }
        };
        self.emit(SessionEvent::AnalysisFinished {
            analysis: analysis.clone(),
        });

        (Some(frame), analysis)
    }

    async fn complete_answer(
        &self,
        request: ProviderRequest,
        cancel: &CancellationToken,
    ) -> Result<Option<Answer>, ProviderError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Ok(None),
            result = self.provider.complete(request) => result.map(Answer::completed).map(Some),
        }
    }

    async fn stream_answer(
        &self,
        request: ProviderRequest,
        cancel: &CancellationToken,
    ) -> Result<Option<Answer>, ProviderError> {
        let rx = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(None),
            rx = self.provider.stream(request) => rx?,
        };

        let mut aggregator = StreamAggregator::new();
        if let Some(progress) = &self.progress {
            aggregator = aggregator.with_progress(progress.clone());
        }
        if let Some(timeout) = self.settings.idle_timeout {
            aggregator = aggregator.with_idle_timeout(timeout);
        }
        let result = aggregator.collect(ReceiverStream::new(rx), cancel).await;

        Ok(Some(match result.outcome {
            StreamOutcome::Finished => Answer::completed(result.text),
            StreamOutcome::Cancelled if result.deltas == 0 => return Ok(None),
            StreamOutcome::Cancelled => Answer::partial(result.text, None),
            StreamOutcome::Failed(e) if result.deltas > 0 => Answer::partial(result.text, Some(e)),
            StreamOutcome::Failed(e) => Answer::failed(e),
        }))
    }

    fn record(&mut self, turn: Turn) -> usize {
        let status = turn.status;
        self.store.append(turn);
        let index = self.store.len() - 1;

        debug!(index, ?status, "Turn recorded");
        self.events.publish(DomainEvent::TurnAppended {
            index,
            failed: status == TurnStatus::Failed,
            timestamp: Utc::now(),
        });
        self.emit(SessionEvent::TurnRecorded { index, status });
        index
    }

    async fn close_summary_round(&mut self) -> Option<u32> {
        let round = self.summarizer.check_and_trigger(self.store.as_mut()).await?;
        self.emit(SessionEvent::SummaryCreated { round_number: round });
        Some(round)
    }

    fn report_error(&self, context: &str, error: &ProviderError) {
        warn!(context, error = %error, "Provider request failed");
        self.events.publish(DomainEvent::ErrorOccurred {
            context: context.to_string(),
            error_message: error.to_string(),
            timestamp: Utc::now(),
        });
        self.emit(SessionEvent::Error {
            message: error.to_string(),
        });
    }

    fn report_capture_failure(&self, error: &CaptureError) {
        warn!(error = %error, "Screen context unavailable for this turn");
        self.events.publish(DomainEvent::CaptureFailed {
            error_message: error.to_string(),
            timestamp: Utc::now(),
        });
    }

    fn emit(&self, event: SessionEvent) {
        if let Some(tx) = &self.progress {
            let _ = tx.send(event);
        }
    }
}

/// How the chat request resolved, before it becomes a turn.
struct Answer {
    text: String,
    status: TurnStatus,
    error: Option<ProviderError>,
}

impl Answer {
    fn completed(text: String) -> Self {
        Self {
            text,
            status: TurnStatus::Completed,
            error: None,
        }
    }

    fn partial(text: String, error: Option<ProviderError>) -> Self {
        Self {
            text,
            status: TurnStatus::Partial,
            error,
        }
    }

    fn failed(error: ProviderError) -> Self {
        Self {
            text: error_description(&error),
            status: TurnStatus::Failed,
            error: Some(error),
        }
    }
}

//! Shared plumbing for the chat commands: session setup and live output.

use std::future::Future;
use std::io::Write;

use sketchpal_config::AppConfig;
use sketchpal_conversation::{ChatSession, SessionEvent};
use sketchpal_core::capture::CaptureSource;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

pub type Events = mpsc::UnboundedReceiver<SessionEvent>;

/// Load config and open a session wired to an event channel.
pub fn open_session(
    capture: CaptureSource,
) -> Result<(ChatSession, Events), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    let session = match ChatSession::from_config(&config, capture) {
        Ok(session) => session,
        Err(e) => {
            print_setup_help();
            return Err(e.into());
        }
    };

    let (tx, rx) = mpsc::unbounded_channel();
    Ok((session.with_progress(tx), rx))
}

fn print_setup_help() {
    eprintln!();
    eprintln!("  ERROR: the chat provider is not configured.");
    eprintln!();
    eprintln!("  For the hosted provider, set one of:");
    eprintln!("    OPENAI_API_KEY    = 'sk-...'");
    eprintln!("    SKETCHPAL_API_KEY = 'sk-...'");
    eprintln!();
    eprintln!("  For a custom workflow endpoint, set:");
    eprintln!("    SKETCHPAL_PROVIDER   = 'custom'");
    eprintln!("    SKETCHPAL_CUSTOM_URL = 'http://localhost:7868/api/v1/run/<flow-id>'");
    eprintln!();
    eprintln!("  Or edit: {}", AppConfig::config_dir().join("config.toml").display());
    eprintln!();
}

/// Drive `work` to completion while rendering session events as they
/// arrive. Ctrl+C during a screen analysis stops capture and lets the send
/// continue without it; otherwise it cancels `cancel`. The process is never
/// killed.
pub async fn drive<F, T>(
    work: F,
    events: &mut Events,
    cancel: &CancellationToken,
    capture_stop: &CancellationToken,
) -> (T, Renderer)
where
    F: Future<Output = T>,
{
    let mut renderer = Renderer::default();
    tokio::pin!(work);

    let result = loop {
        tokio::select! {
            result = &mut work => break result,
            Some(event) = events.recv() => renderer.handle(event),
            _ = tokio::signal::ctrl_c(), if !cancel.is_cancelled() => {
                if renderer.analyzing && !capture_stop.is_cancelled() {
                    eprintln!("\n  (skipping screen analysis...)");
                    capture_stop.cancel();
                } else {
                    eprintln!("\n  (cancelling...)");
                    cancel.cancel();
                }
            }
        }
    };

    while let Ok(event) = events.try_recv() {
        renderer.handle(event);
    }
    (result, renderer)
}

/// Prints session events to the terminal.
#[derive(Debug, Default)]
pub struct Renderer {
    /// Whether any answer text was already printed live
    pub streamed: bool,
    analyzing: bool,
}

impl Renderer {
    pub fn handle(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::AnalysisStarted => {
                self.analyzing = true;
                eprintln!("  (analyzing screen...)")
            }
            SessionEvent::AnalysisFinished { analysis: None } => {
                self.analyzing = false;
                eprintln!("  (screen analysis unavailable, continuing without it)")
            }
            SessionEvent::AnalysisFinished { analysis: Some(_) } => self.analyzing = false,
            SessionEvent::Delta { delta, .. } => {
                if !self.streamed {
                    print!("  Assistant > ");
                    self.streamed = true;
                }
                print!("{delta}");
                let _ = std::io::stdout().flush();
            }
            SessionEvent::TurnRecorded { .. } => {}
            SessionEvent::SummaryCreated { round_number } => {
                eprintln!("  [summary round {round_number} recorded]")
            }
            SessionEvent::Error { message } => eprintln!("  [Error] {message}"),
        }
    }
}

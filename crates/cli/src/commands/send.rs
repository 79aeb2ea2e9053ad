//! `sketchpal send`: one message, one answer.

use sketchpal_core::capture::CaptureSource;
use sketchpal_core::conversation::TurnStatus;
use tokio_util::sync::CancellationToken;

use super::render::{drive, open_session};

pub async fn run(
    message: String,
    capture: CaptureSource,
) -> Result<(), Box<dyn std::error::Error>> {
    let (mut session, mut events) = open_session(capture)?;
    let cancel = CancellationToken::new();
    let capture_stop = session.capture_stop();

    let send = session.handle_send(&message, &cancel);
    let (result, renderer) = drive(send, &mut events, &cancel, &capture_stop).await;
    let outcome = result?;

    if renderer.streamed {
        println!();
    } else if outcome.status != TurnStatus::Failed {
        println!("{}", outcome.response);
    }

    match outcome.error {
        Some(e) if outcome.status == TurnStatus::Failed => Err(e.into()),
        _ => Ok(()),
    }
}

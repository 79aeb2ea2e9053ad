//! `sketchpal chat`: interactive conversation.
//!
//! Lines starting with `/` are commands:
//! - `/history`            list recorded turns
//! - `/summaries`          list summary rounds
//! - `/analyze [preset]`   analyze the screen without a question
//! - `/quit`               leave

use std::io::Write;

use sketchpal_conversation::ChatSession;
use sketchpal_core::capture::{AnalysisPreset, CaptureSource};
use sketchpal_core::conversation::TurnStatus;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;

use super::render::{Events, drive, open_session};

/// A parsed REPL line.
#[derive(Debug, PartialEq)]
enum Input {
    Message(String),
    History,
    Summaries,
    Analyze(Option<AnalysisPreset>),
    Quit,
    Unknown(String),
    Empty,
}

fn parse_input(line: &str) -> Input {
    let line = line.trim();
    if line.is_empty() {
        return Input::Empty;
    }
    if matches!(line, "exit" | "quit") {
        return Input::Quit;
    }
    let Some(command) = line.strip_prefix('/') else {
        return Input::Message(line.to_string());
    };

    let (name, arg) = match command.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (command, ""),
    };
    match name {
        "history" => Input::History,
        "summaries" => Input::Summaries,
        "analyze" => Input::Analyze((!arg.is_empty()).then(|| parse_preset(arg))),
        "quit" | "exit" => Input::Quit,
        other => Input::Unknown(other.to_string()),
    }
}

/// Accepts a preset name (`text_content`) or its description; anything else
/// falls back to the general preset.
fn parse_preset(arg: &str) -> AnalysisPreset {
    serde_json::from_value(serde_json::Value::String(arg.to_ascii_lowercase()))
        .unwrap_or_else(|_| AnalysisPreset::from_description(arg))
}

pub async fn run(capture: CaptureSource) -> Result<(), Box<dyn std::error::Error>> {
    let (mut session, mut events) = open_session(capture)?;

    println!();
    println!("  SketchPal: interactive mode");
    println!();
    println!("  Provider:  {}", session.provider_name());
    println!("  Model:     {}", session.settings().model);
    println!(
        "  Screen:    {}",
        if session.can_analyze() { "analysis on" } else { "off" }
    );
    println!();
    println!("  Commands: /history, /summaries, /analyze [preset], /quit");
    println!("  Presets:  {}", AnalysisPreset::descriptions().join(" | "));
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("  You > ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };

        match parse_input(&line) {
            Input::Empty => continue,
            Input::Quit => break,
            Input::History => print_history(&session),
            Input::Summaries => print_summaries(&session),
            Input::Unknown(name) => eprintln!("  Unknown command: /{name}"),
            Input::Analyze(preset) => analyze(&mut session, &mut events, preset).await,
            Input::Message(text) => send(&mut session, &mut events, &text).await,
        }
    }

    println!();
    println!("  Goodbye!");
    println!();
    Ok(())
}

async fn send(session: &mut ChatSession, events: &mut Events, text: &str) {
    let cancel = CancellationToken::new();
    let capture_stop = session.capture_stop();
    let (result, renderer) =
        drive(session.handle_send(text, &cancel), events, &cancel, &capture_stop).await;
    // A skipped analysis only applies to this message
    session.resume_capture();

    match result {
        Ok(outcome) => {
            if renderer.streamed {
                println!();
            } else {
                for line in outcome.response.lines() {
                    println!("  Assistant > {line}");
                }
            }
            if outcome.status == TurnStatus::Partial {
                eprintln!("  (answer incomplete)");
            }
            println!();
        }
        Err(e) => {
            eprintln!("  [Error] {e}");
            println!();
        }
    }
}

async fn analyze(session: &mut ChatSession, events: &mut Events, preset: Option<AnalysisPreset>) {
    let cancel = CancellationToken::new();
    let capture_stop = session.capture_stop();
    let (result, _) =
        drive(session.analyze_screen(preset, &cancel), events, &cancel, &capture_stop).await;
    session.resume_capture();

    match result {
        Ok(outcome) => {
            for line in outcome.response.lines() {
                println!("  Screen > {line}");
            }
            println!();
        }
        Err(e) => {
            eprintln!("  [Screen] {e}");
            println!();
        }
    }
}

fn print_history(session: &ChatSession) {
    let turns = session.store().turns();
    if turns.is_empty() {
        println!("  (no turns yet)\n");
        return;
    }
    for (i, turn) in turns.iter().enumerate() {
        let marker = match turn.status {
            TurnStatus::Completed => "",
            TurnStatus::Partial => " [partial]",
            TurnStatus::Failed => " [failed]",
        };
        println!(
            "  #{} {}{marker}",
            i + 1,
            turn.created_at.format("%H:%M:%S")
        );
        println!("     You:       {}", turn.user_message);
        println!("     Assistant: {}", first_line(&turn.ai_response));
        if let Some(analysis) = &turn.screen_analysis {
            println!("     Screen:    {}", first_line(analysis));
        }
    }
    println!();
}

fn print_summaries(session: &ChatSession) {
    let summaries = session.store().summaries();
    if summaries.is_empty() {
        println!("  (no summaries yet; one is written every 5 turns)\n");
        return;
    }
    for summary in summaries {
        println!(
            "  Round {} ({} turns, {})",
            summary.round_number,
            summary.covered_turns.len(),
            summary.created_at.format("%H:%M:%S")
        );
        for line in summary.text.lines() {
            println!("     {line}");
        }
    }
    println!();
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or_default()
}

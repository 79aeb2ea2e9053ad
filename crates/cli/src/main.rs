//! SketchPal CLI: the main entry point.
//!
//! Commands:
//! - `onboard`: write a starter config file
//! - `chat`:    interactive conversation
//! - `send`:    one message, one answer
//!
//! `--frame` and `--canvas` point the file-backed capture adapter at an image
//! and a canvas document, standing in for a live screen share.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod capture;
mod commands;

#[derive(Parser)]
#[command(
    name = "sketchpal",
    about = "SketchPal: a canvas chat assistant",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Image file to use as the captured screen frame
    #[arg(long, global = true, value_name = "IMAGE")]
    frame: Option<PathBuf>,

    /// JSON file holding the canvas document state
    #[arg(long, global = true, value_name = "JSON", requires = "frame")]
    canvas: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a starter configuration file
    Onboard,

    /// Chat interactively
    Chat,

    /// Send a single message and print the answer
    Send {
        /// The message to send
        #[arg(short, long)]
        message: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let capture = capture::source(cli.frame, cli.canvas);

    match cli.command {
        Commands::Onboard => commands::onboard::run().await?,
        Commands::Chat => commands::chat::run(capture).await?,
        Commands::Send { message } => commands::send::run(message, capture).await?,
    }

    Ok(())
}

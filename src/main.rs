//! chatroom - terminal client for a shared chat room with an AI assistant
//!
//! Two people post as named speakers into one Firestore collection; either can
//! ask Gemini to join in, and images go through Cloudinary.

mod api;
mod config;
mod models;
mod room;
mod tui;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use config::Config;

#[derive(Parser)]
#[command(name = "chatroom")]
#[command(about = "Terminal client for a two-person chat room with an AI assistant", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Keep messages in memory instead of Firestore
    #[arg(long, global = true)]
    offline: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Send a message
    Send {
        /// Message content
        message: String,

        /// Speaker to post as (defaults to the first configured speaker)
        #[arg(long = "as", value_name = "SPEAKER")]
        speaker: Option<String>,
    },

    /// Send a message and ask the AI to reply
    Ask {
        /// Message content
        message: String,

        /// Speaker to post as
        #[arg(long = "as", value_name = "SPEAKER")]
        speaker: Option<String>,
    },

    /// Upload an image and post it
    Upload {
        /// Image file
        path: PathBuf,

        /// Speaker to post as
        #[arg(long = "as", value_name = "SPEAKER")]
        speaker: Option<String>,
    },

    /// Show recent messages
    History {
        /// Maximum number of messages to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Print messages as they arrive
    Watch,

    /// Launch the terminal user interface
    Tui {
        /// Speaker selected at start
        #[arg(long = "as", value_name = "SPEAKER")]
        speaker: Option<String>,
    },

    /// Show the config file location and effective settings
    Config {
        /// Write a default config file if none exists
        #[arg(long)]
        init: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging. In the TUI, output goes to the debug pane instead
    // of the terminal.
    let level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| level.into());
    let tui_logs = matches!(cli.command, Commands::Tui { .. }).then(tui::LogBuffer::new);
    match tui_logs {
        Some(ref logs) => tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_ansi(false)
                    .with_writer(logs.clone()),
            )
            .init(),
        None => tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .init(),
    }

    let config = Config::load()?;
    let offline = cli.offline;

    match cli.command {
        Commands::Send { message, speaker } => {
            let speaker = api::resolve_speaker(&config, speaker.as_deref());
            tracing::info!("Sending message as {}...", speaker);
            api::send_message(&config, offline, &speaker, &message).await?;
        }
        Commands::Ask { message, speaker } => {
            let speaker = api::resolve_speaker(&config, speaker.as_deref());
            api::ask_ai(&config, offline, &speaker, &message).await?;
        }
        Commands::Upload { path, speaker } => {
            let speaker = api::resolve_speaker(&config, speaker.as_deref());
            tracing::info!("Uploading {}...", path.display());
            api::upload_image(&config, offline, &speaker, &path).await?;
        }
        Commands::History { limit } => {
            api::read_history(&config, offline, limit).await?;
        }
        Commands::Watch => {
            api::watch(&config, offline).await?;
        }
        Commands::Tui { speaker } => {
            let speaker = api::resolve_speaker(&config, speaker.as_deref());
            let logs = tui_logs.unwrap_or_default();
            tui::run(config, offline, speaker, logs).await?;
        }
        Commands::Config { init } => {
            api::show_config(&config, init)?;
        }
    }

    Ok(())
}

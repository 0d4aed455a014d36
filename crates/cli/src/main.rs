//! Salin CLI — the main entry point.
//!
//! Commands:
//! - `chat`   — Tool-calling chat, interactive or single-message
//! - `judge`  — Evaluate one English → Filipino translation pair
//! - `config` — Show the effective configuration or write a default file

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "salin",
    about = "Salin — English → Filipino translation judge",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Chat with the tool-calling assistant
    Chat {
        /// Send a single message instead of entering interactive mode
        #[arg(short, long)]
        message: Option<String>,

        /// Stream the reply as it is generated
        #[arg(long)]
        stream: bool,
    },

    /// Judge a translation with the evaluate → reflect → revise pipeline
    Judge {
        /// English source text
        #[arg(short, long)]
        source: String,

        /// Filipino candidate translation
        #[arg(short, long)]
        candidate: String,

        /// Optional Filipino reference translation
        #[arg(short, long)]
        reference: Option<String>,

        /// Optional domain guidelines
        #[arg(short, long)]
        guidelines: Option<String>,

        /// Print the full pipeline output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show configuration
    Config {
        /// Write a default config file if none exists
        #[arg(long, conflicts_with = "path")]
        init: bool,

        /// Print the config file path
        #[arg(long)]
        path: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Chat { message, stream } => commands::chat::run(message, stream).await?,
        Commands::Judge {
            source,
            candidate,
            reference,
            guidelines,
            json,
        } => commands::judge::run(source, candidate, reference, guidelines, json).await?,
        Commands::Config { init, path } => {
            if init {
                commands::config_cmd::init().await?
            } else if path {
                commands::config_cmd::path().await?
            } else {
                commands::config_cmd::show().await?
            }
        }
    }

    Ok(())
}

//! voice-sampler - record a short voice sample and clone it
//!
//! Subcommands:
//! - `voice-sampler record` - Record one sample (10s max), optionally synthesize
//! - `voice-sampler serve` - Run the HTTP control API
//! - `voice-sampler health` - Query the voice-cloning service

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use voice_sampler::config::{Config, DEFAULT_CONFIG_PATH};

mod commands;

#[derive(Parser)]
#[command(name = "voice-sampler")]
#[command(about = "Record a short voice sample and hand it to a voice-cloning service")]
#[command(version)]
struct Cli {
    /// Config file (without extension is fine)
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record one voice sample
    Record {
        /// Replay this audio file instead of the configured source
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Directory for the recorded WAV (default: audio.recordings_path)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Speak this text in the recorded voice once recording finishes
        #[arg(short, long)]
        text: Option<String>,

        /// Where to save the generated voice
        #[arg(long)]
        output_generated: Option<PathBuf>,
    },

    /// Run the HTTP control API
    Serve,

    /// Check the voice-cloning service
    Health,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load(&cli.config)?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Record {
            input,
            output,
            text,
            output_generated,
        } => {
            commands::record(
                &config,
                commands::RecordArgs {
                    input,
                    output,
                    text,
                    output_generated,
                },
            )
            .await
        }
        Commands::Serve => commands::serve(&config).await,
        Commands::Health => commands::health(&config).await,
    }
}

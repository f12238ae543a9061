//! Taleweaver command line entry point.

use std::error::Error;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use taleweaver_cli::config::Config;
use taleweaver_cli::error::AppError;
use taleweaver_cli::session::{self, Start};
use taleweaver_cli::telemetry::Telemetry;
use taleweaver_client::HttpStoryGateway;
use taleweaver_core::ids::StoryId;
use tokio::io::BufReader;

/// Generate and play choose-your-own-adventure stories.
#[derive(Debug, Parser)]
#[command(name = "taleweaver", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Generate a new story, then play it.
    New {
        /// Story theme; prompted for when omitted.
        theme: Option<String>,
    },
    /// Play a story that has already been generated.
    Play {
        /// Identifier of the story.
        story_id: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let config = Config::from_env()?;
    let telemetry = Telemetry::init(config.otlp_endpoint.as_deref())?;

    tracing::info!(api_url = %config.api_url, "starting taleweaver");

    let gateway = HttpStoryGateway::new(config.api_url.clone(), config.request_timeout)
        .map_err(|e| AppError::Config(format!("cannot build HTTP client: {e}")))?;
    let start = match cli.command {
        Command::New { theme } => Start::NewStory(theme),
        Command::Play { story_id } => Start::Play(StoryId::new(story_id)),
    };

    let mut input = BufReader::new(tokio::io::stdin());
    let mut output = tokio::io::stdout();
    let result = session::run(
        start,
        Arc::new(gateway),
        config.poller_config(),
        &mut input,
        &mut output,
    )
    .await;

    telemetry.shutdown()?;
    result?;
    Ok(())
}

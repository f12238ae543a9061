//! Top-level session: alternates between generating and playing stories.

use std::sync::Arc;

use taleweaver_core::error::DomainError;
use taleweaver_core::gateway::StoryGateway;
use taleweaver_core::ids::StoryId;
use taleweaver_jobs::application::poller::{JobPoller, PollerConfig};
use taleweaver_story::application::loader::load_story;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{instrument, warn};

use crate::error::AppError;
use crate::generate::generate;
use crate::play::{Command, PlayOutcome, play};

/// Where a session begins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Start {
    /// Generate a new story, optionally from a given theme.
    NewStory(Option<String>),
    /// Play an existing story.
    Play(StoryId),
}

/// Asks whether to generate another story after a story could not be
/// shown. Returns false on quit or end of input.
async fn offer_new_story<R, W>(input: &mut R, output: &mut W) -> Result<bool, AppError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut line = String::new();
    loop {
        output.write_all(b"[n] new story  [q] quit > ").await?;
        output.flush().await?;
        line.clear();
        if input.read_line(&mut line).await? == 0 {
            return Ok(false);
        }
        match Command::parse(&line) {
            Command::NewStory => return Ok(true),
            Command::Quit => return Ok(false),
            Command::Choose(_) | Command::Restart | Command::Unknown => {}
        }
    }
}

/// Runs the session until the player quits or input ends.
///
/// # Errors
///
/// Returns `AppError::Io` if the terminal fails. Stories that cannot be
/// loaded are reported to the player, who may start a new one.
#[instrument(skip_all)]
pub async fn run<R, W>(
    start: Start,
    gateway: Arc<dyn StoryGateway>,
    poller_config: PollerConfig,
    input: &mut R,
    output: &mut W,
) -> Result<(), AppError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut poller = JobPoller::new(Arc::clone(&gateway), poller_config);
    let mut next = start;

    loop {
        let story_id = match next {
            Start::NewStory(theme) => match generate(&mut poller, theme, input, output).await? {
                Some(story_id) => story_id,
                None => break,
            },
            Start::Play(story_id) => story_id,
        };

        let story = match load_story(&story_id, gateway.as_ref()).await {
            Ok(story) => story,
            Err(error) => {
                warn!(error = %error, "story could not be loaded");
                let message = match &error {
                    DomainError::StoryNotFound(_) => "Story not found",
                    _ => "Failed to load story",
                };
                output.write_all(format!("{message}\n").as_bytes()).await?;
                poller.reset();
                if offer_new_story(input, output).await? {
                    next = Start::NewStory(None);
                    continue;
                }
                break;
            }
        };

        // Playing hands the story over; the finished job is no longer needed.
        poller.reset();
        next = match play(&story, input, output).await? {
            PlayOutcome::Quit => break,
            PlayOutcome::NewStory => Start::NewStory(None),
        };
    }

    poller.shutdown();
    output.flush().await?;
    Ok(())
}

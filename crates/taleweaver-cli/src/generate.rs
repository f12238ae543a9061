//! Story generation flow: theme input, submission, progress and retry.

use taleweaver_core::error::DomainError;
use taleweaver_core::ids::StoryId;
use taleweaver_jobs::application::poller::JobPoller;
use taleweaver_jobs::domain::state::JobPhase;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{info, warn};

use crate::error::AppError;

async fn prompt<R, W>(question: &str, input: &mut R, output: &mut W) -> Result<Option<String>, AppError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    output.write_all(question.as_bytes()).await?;
    output.flush().await?;
    let mut line = String::new();
    if input.read_line(&mut line).await? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_owned()))
}

/// Asks for a theme (unless `theme` is given), generates a story and returns
/// its id once the job completes.
///
/// On failure the error is shown and the player may try again with a new
/// theme. Returns `Ok(None)` if the player declines or input ends.
///
/// # Errors
///
/// Returns `AppError::Io` if the terminal cannot be read or written.
pub async fn generate<R, W>(
    poller: &mut JobPoller,
    theme: Option<String>,
    input: &mut R,
    output: &mut W,
) -> Result<Option<StoryId>, AppError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    // A result left over from an earlier run must not answer this one.
    if poller.phase() != JobPhase::Idle {
        poller.reset();
    }

    let mut theme = theme;
    loop {
        let current = match theme.take() {
            Some(theme) => theme,
            None => match prompt("Enter a theme for your story: ", input, output).await? {
                Some(theme) => theme,
                None => return Ok(None),
            },
        };

        match poller.submit(&current).await {
            Ok(job_id) => {
                info!(job_id = %job_id, "story generation started");
                output
                    .write_all(
                        format!("Generating your {} story. This may take a moment...\n", current.trim())
                            .as_bytes(),
                    )
                    .await?;
                output.flush().await?;
            }
            // Rejected before any request (blank theme); the poller stays idle.
            Err(DomainError::Submission(message)) if poller.phase() == JobPhase::Idle => {
                output.write_all(format!("{message}\n").as_bytes()).await?;
                continue;
            }
            Err(_) => {}
        }

        let error = match poller.wait_for_outcome().await {
            Ok(story_id) => {
                output.write_all(b"Your story is ready!\n").await?;
                return Ok(Some(story_id));
            }
            Err(error) => error,
        };

        warn!(error = %error, "story generation failed");
        let message = poller
            .state()
            .error_message()
            .unwrap_or_else(|| error.to_string());
        output.write_all(format!("{message}\n").as_bytes()).await?;

        let again = prompt("Try again? [Y/n] ", input, output).await?;
        poller.reset();
        match again.as_deref() {
            Some(answer) if answer.is_empty() || answer.eq_ignore_ascii_case("y") => {}
            _ => return Ok(None),
        }
    }
}

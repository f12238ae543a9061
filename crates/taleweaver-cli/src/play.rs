//! Interactive story playback.
//!
//! Reads one command per line and renders the engine's current view after
//! every move. Input and output are generic so the loop can be driven from a
//! byte buffer in tests.

use taleweaver_core::error::DomainError;
use taleweaver_story::domain::engine::{NodeView, StoryGraphEngine};
use taleweaver_story::domain::graph::Story;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info};

use crate::error::AppError;

/// How a play session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayOutcome {
    /// The player quit, or input ended.
    Quit,
    /// The player asked for a new story.
    NewStory,
}

/// A single line of player input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Take the option at this zero-based index.
    Choose(usize),
    /// Go back to the first node.
    Restart,
    /// Leave this story and generate another.
    NewStory,
    /// Stop playing.
    Quit,
    /// Anything else.
    Unknown,
}

impl Command {
    /// Parses a line: an option number (1-based), `r`, `n` or `q`.
    #[must_use]
    pub fn parse(line: &str) -> Self {
        match line.trim().to_ascii_lowercase().as_str() {
            "r" | "restart" => Self::Restart,
            "n" | "new" => Self::NewStory,
            "q" | "quit" => Self::Quit,
            other => match other.parse::<usize>() {
                Ok(number) if number >= 1 => Self::Choose(number - 1),
                _ => Self::Unknown,
            },
        }
    }
}

/// Renders a node view as terminal text.
#[must_use]
pub fn render_view(view: &NodeView<'_>) -> String {
    let mut lines = vec![String::new(), view.content.to_owned(), String::new()];
    if view.is_ending {
        if view.is_winning_ending {
            lines.push("Congratulations! You reached a winning ending.".to_owned());
        } else {
            lines.push("The End. Your adventure has ended.".to_owned());
        }
    } else {
        lines.push("What will you do?".to_owned());
        lines.extend(
            view.options
                .iter()
                .enumerate()
                .map(|(i, option)| format!("  {}. {}", i + 1, option.text)),
        );
    }
    lines.push(String::new());
    lines.join("\n")
}

fn prompt_for(view: &NodeView<'_>) -> String {
    if view.is_ending {
        "[r] restart  [n] new story  [q] quit > ".to_owned()
    } else {
        format!(
            "[1-{}] choose  [r] restart  [n] new story  [q] quit > ",
            view.options.len()
        )
    }
}

/// Plays `story` until the player quits, asks for a new story, or input
/// ends.
///
/// # Errors
///
/// Returns `AppError::Io` if the terminal cannot be read or written, and
/// `AppError::Domain` if the graph turns out to be inconsistent.
pub async fn play<R, W>(story: &Story, input: &mut R, output: &mut W) -> Result<PlayOutcome, AppError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut engine = StoryGraphEngine::new(story.graph.clone());
    info!(story_id = %story.id, "playing story");

    output
        .write_all(format!("\n=== {} ===\n", story.title).as_bytes())
        .await?;
    let mut screen = render_view(&engine.current_view()?);

    let mut line = String::new();
    loop {
        let prompt = prompt_for(&engine.current_view()?);
        output.write_all(screen.as_bytes()).await?;
        output.write_all(prompt.as_bytes()).await?;
        output.flush().await?;

        line.clear();
        if input.read_line(&mut line).await? == 0 {
            return Ok(PlayOutcome::Quit);
        }

        screen = match Command::parse(&line) {
            Command::Quit => return Ok(PlayOutcome::Quit),
            Command::NewStory => return Ok(PlayOutcome::NewStory),
            Command::Restart => {
                engine.restart();
                render_view(&engine.current_view()?)
            }
            Command::Choose(index) => match engine.choose_index(index) {
                Ok(view) => {
                    debug!(node_id = %view.node_id, "moved");
                    render_view(&view)
                }
                Err(DomainError::InvalidTransition { .. }) => {
                    "\nThat is not one of the options.\n".to_owned()
                }
                Err(other) => return Err(other.into()),
            },
            Command::Unknown => "\nPlease enter an option number, r, n or q.\n".to_owned(),
        };
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use taleweaver_core::ids::{NodeId, StoryId};
    use taleweaver_story::domain::graph::{StoryGraph, StoryNode, StoryOption};

    use super::*;

    fn story() -> Story {
        let nodes = vec![
            StoryNode {
                id: NodeId::from("root"),
                content: "A fork in the road.".to_owned(),
                is_ending: false,
                is_winning_ending: false,
                options: vec![
                    StoryOption {
                        text: "Go left".to_owned(),
                        target: NodeId::from("win"),
                    },
                    StoryOption {
                        text: "Go right".to_owned(),
                        target: NodeId::from("lose"),
                    },
                ],
            },
            StoryNode {
                id: NodeId::from("win"),
                content: "A castle of gold.".to_owned(),
                is_ending: true,
                is_winning_ending: true,
                options: Vec::new(),
            },
            StoryNode {
                id: NodeId::from("lose"),
                content: "A bottomless pit.".to_owned(),
                is_ending: true,
                is_winning_ending: false,
                options: Vec::new(),
            },
        ];
        Story {
            id: StoryId::from("1"),
            title: "Two Roads".to_owned(),
            graph: Arc::new(StoryGraph::new(NodeId::from("root"), nodes).unwrap()),
        }
    }

    async fn run(script: &str) -> (PlayOutcome, String) {
        let mut input = script.as_bytes();
        let mut output = Vec::new();
        let outcome = play(&story(), &mut input, &mut output).await.unwrap();
        (outcome, String::from_utf8(output).unwrap())
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(Command::parse("1\n"), Command::Choose(0));
        assert_eq!(Command::parse(" 3 "), Command::Choose(2));
        assert_eq!(Command::parse("R"), Command::Restart);
        assert_eq!(Command::parse("n"), Command::NewStory);
        assert_eq!(Command::parse("quit"), Command::Quit);
        assert_eq!(Command::parse("0"), Command::Unknown);
        assert_eq!(Command::parse("left"), Command::Unknown);
    }

    #[tokio::test]
    async fn test_winning_path_shows_congratulations() {
        // Act
        let (outcome, output) = run("1\nq\n").await;

        // Assert
        assert_eq!(outcome, PlayOutcome::Quit);
        assert!(output.contains("=== Two Roads ==="));
        assert!(output.contains("  1. Go left"));
        assert!(output.contains("A castle of gold."));
        assert!(output.contains("Congratulations! You reached a winning ending."));
    }

    #[tokio::test]
    async fn test_losing_ending_shows_the_end() {
        let (_, output) = run("2\nq\n").await;

        assert!(output.contains("The End. Your adventure has ended."));
        assert!(!output.contains("Congratulations"));
    }

    #[tokio::test]
    async fn test_out_of_range_choice_keeps_position() {
        // Act
        let (_, output) = run("7\n1\nq\n").await;

        // Assert
        assert!(output.contains("That is not one of the options."));
        assert!(output.contains("A castle of gold."));
    }

    #[tokio::test]
    async fn test_choices_on_an_ending_are_rejected() {
        let (_, output) = run("2\n1\nq\n").await;

        assert!(output.contains("That is not one of the options."));
        assert!(!output.contains("A castle of gold."));
    }

    #[tokio::test]
    async fn test_restart_returns_to_first_node() {
        // Act
        let (_, output) = run("2\nr\nq\n").await;

        // Assert
        assert_eq!(output.matches("A fork in the road.").count(), 2);
    }

    #[tokio::test]
    async fn test_new_story_request_ends_playback() {
        let (outcome, _) = run("n\n").await;

        assert_eq!(outcome, PlayOutcome::NewStory);
    }

    #[tokio::test]
    async fn test_end_of_input_quits() {
        let (outcome, _) = run("").await;

        assert_eq!(outcome, PlayOutcome::Quit);
    }
}

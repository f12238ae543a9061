//! Wire-level fixtures shared by unit and integration tests.

use std::collections::HashMap;

use taleweaver_core::wire::{
    CompleteStoryResponse, JobStatusResponse, WireId, WireStoryNode, WireStoryOption,
};

/// A poll response carrying only a status string.
#[must_use]
pub fn status(value: &str) -> JobStatusResponse {
    JobStatusResponse {
        status: Some(value.to_owned()),
        ..JobStatusResponse::default()
    }
}

/// A `processing` poll response.
#[must_use]
pub fn processing() -> JobStatusResponse {
    status("processing")
}

/// A `completed` poll response pointing at `story_id`.
#[must_use]
pub fn completed(story_id: &str) -> JobStatusResponse {
    JobStatusResponse {
        status: Some("completed".to_owned()),
        story_id: Some(WireId::from(story_id)),
        job_error: None,
    }
}

/// A `failed` poll response with an optional message.
#[must_use]
pub fn failed(message: Option<&str>) -> JobStatusResponse {
    JobStatusResponse {
        status: Some("failed".to_owned()),
        story_id: None,
        job_error: message.map(str::to_owned),
    }
}

/// A non-ending node whose options are `(text, target)` pairs.
#[must_use]
pub fn node(id: &str, content: &str, options: &[(&str, &str)]) -> WireStoryNode {
    WireStoryNode {
        id: WireId::from(id),
        content: content.to_owned(),
        is_ending: false,
        is_winning_ending: false,
        options: options
            .iter()
            .map(|(text, target)| WireStoryOption {
                text: (*text).to_owned(),
                node_id: Some(WireId::from(*target)),
            })
            .collect(),
    }
}

/// An ending node.
#[must_use]
pub fn ending(id: &str, content: &str, winning: bool) -> WireStoryNode {
    WireStoryNode {
        id: WireId::from(id),
        content: content.to_owned(),
        is_ending: true,
        is_winning_ending: winning,
        options: Vec::new(),
    }
}

/// Assembles a complete story from its root id and nodes.
///
/// # Panics
///
/// Panics if `root` is not among `nodes`.
#[must_use]
pub fn story(id: &str, title: &str, root: &str, nodes: Vec<WireStoryNode>) -> CompleteStoryResponse {
    let all_nodes: HashMap<String, WireStoryNode> = nodes
        .into_iter()
        .map(|n| (n.id.to_string(), n))
        .collect();
    let root_node = all_nodes
        .get(root)
        .cloned()
        .expect("fixture root must be one of the nodes");
    CompleteStoryResponse {
        id: WireId::from(id),
        title: title.to_owned(),
        root_node,
        all_nodes,
    }
}

/// Two nodes: a root with a single option leading to a winning ending.
#[must_use]
pub fn winning_story() -> CompleteStoryResponse {
    story(
        "1",
        "A Short Walk",
        "root",
        vec![
            node("root", "A fork in the road.", &[("go left", "a")]),
            ending("a", "You win", true),
        ],
    )
}

/// A story with a cycle between `entrance` and `hall`, one losing ending and
/// one winning ending.
#[must_use]
pub fn cave_story() -> CompleteStoryResponse {
    story(
        "7",
        "The Cave",
        "entrance",
        vec![
            node(
                "entrance",
                "A dark cave mouth yawns before you.",
                &[("Enter the cave", "hall"), ("Walk away", "home")],
            ),
            node(
                "hall",
                "A torch-lit hall. A chest sits in the corner.",
                &[("Go back outside", "entrance"), ("Open the chest", "treasure")],
            ),
            ending("home", "You head home. Nothing ventured, nothing gained.", false),
            ending("treasure", "Gold! You are rich beyond measure.", true),
        ],
    )
}

//! Story loading.
//!
//! Fetches a completed story through the gateway and decodes its wire
//! representation into a validated [`Story`].

use std::sync::Arc;

use taleweaver_core::error::DomainError;
use taleweaver_core::gateway::StoryGateway;
use taleweaver_core::ids::{NodeId, StoryId};
use taleweaver_core::wire::{CompleteStoryResponse, WireStoryNode};
use tracing::{info, instrument, warn};

use crate::domain::graph::{Story, StoryGraph, StoryNode, StoryOption};

fn decode_node(key: &str, node: WireStoryNode) -> Result<StoryNode, DomainError> {
    let id = node.id.to_string();
    if id != key {
        return Err(DomainError::GraphIntegrity(format!(
            "node stored under key {key} carries id {id}"
        )));
    }

    let mut options = Vec::with_capacity(node.options.len());
    for option in node.options {
        match option.node_id {
            Some(target) => options.push(StoryOption {
                text: option.text,
                target: NodeId::new(target.to_string()),
            }),
            // Endings never present their options.
            None if node.is_ending => {}
            None => {
                return Err(DomainError::GraphIntegrity(format!(
                    "option \"{}\" of node {id} has no target",
                    option.text
                )));
            }
        }
    }

    Ok(StoryNode {
        id: NodeId::new(id),
        content: node.content,
        is_ending: node.is_ending,
        is_winning_ending: node.is_winning_ending,
        options,
    })
}

/// Decodes and validates a complete story response.
///
/// # Errors
///
/// Returns `DomainError::GraphIntegrity` if a node is keyed under a different
/// id, an option of a non-ending node has no target, or the resulting graph
/// fails validation.
pub fn decode_story(response: CompleteStoryResponse) -> Result<Story, DomainError> {
    let root = NodeId::new(response.root_node.id.to_string());
    let nodes = response
        .all_nodes
        .into_iter()
        .map(|(key, node)| decode_node(&key, node))
        .collect::<Result<Vec<_>, _>>()?;
    let graph = StoryGraph::new(root, nodes)?;

    Ok(Story {
        id: StoryId::new(response.id.to_string()),
        title: response.title,
        graph: Arc::new(graph),
    })
}

/// Loads the story a completed job produced.
///
/// # Errors
///
/// Returns `DomainError::StoryNotFound` if the backend does not know the
/// story, `DomainError::Infrastructure` for any other transport failure, and
/// `DomainError::GraphIntegrity` if the story graph is malformed.
#[instrument(skip_all, fields(story_id = %story_id))]
pub async fn load_story(
    story_id: &StoryId,
    gateway: &dyn StoryGateway,
) -> Result<Story, DomainError> {
    let response = gateway.complete_story(story_id).await.map_err(|error| {
        warn!(error = %error, "failed to load story");
        if error.is_not_found() {
            DomainError::StoryNotFound(story_id.clone())
        } else {
            DomainError::Infrastructure(format!("Failed to load story: {error}"))
        }
    })?;

    let story = decode_story(response)?;
    info!(title = %story.title, nodes = story.graph.len(), "story loaded");
    Ok(story)
}

//! The immutable story graph.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;

use taleweaver_core::error::DomainError;
use taleweaver_core::ids::{NodeId, StoryId};

/// A choice leading from one node to another.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoryOption {
    /// Label presented to the player.
    pub text: String,
    /// The node this option leads to.
    pub target: NodeId,
}

/// A single narrative node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoryNode {
    /// Unique within its graph.
    pub id: NodeId,
    /// Narrative text.
    pub content: String,
    /// Whether the story ends here.
    pub is_ending: bool,
    /// Whether this is a winning ending. Only meaningful for endings.
    pub is_winning_ending: bool,
    /// Choices in presentation order.
    pub options: Vec<StoryOption>,
}

impl StoryNode {
    /// Options that may be offered to the player. Endings offer none, even if
    /// the underlying data lists some.
    #[must_use]
    pub fn presented_options(&self) -> &[StoryOption] {
        if self.is_ending { &[] } else { &self.options }
    }
}

/// A finite directed graph of story nodes with a designated root.
///
/// Cycles are allowed. Construction validates that the root exists, that
/// every non-ending node has at least one option, and that every presented
/// option points at a node of the graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoryGraph {
    root: NodeId,
    nodes: HashMap<NodeId, StoryNode>,
}

impl StoryGraph {
    /// Builds and validates a graph.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::GraphIntegrity` if a node id is duplicated, the
    /// root is missing, a non-ending node has no options, or an option
    /// targets a node outside the graph.
    pub fn new(
        root: NodeId,
        nodes: impl IntoIterator<Item = StoryNode>,
    ) -> Result<Self, DomainError> {
        let mut by_id = HashMap::new();
        for node in nodes {
            match by_id.entry(node.id.clone()) {
                Entry::Occupied(_) => {
                    return Err(DomainError::GraphIntegrity(format!(
                        "duplicate node id {}",
                        node.id
                    )));
                }
                Entry::Vacant(slot) => {
                    slot.insert(node);
                }
            }
        }

        if !by_id.contains_key(&root) {
            return Err(DomainError::GraphIntegrity(format!(
                "root node {root} is not part of the graph"
            )));
        }

        for node in by_id.values() {
            if !node.is_ending && node.options.is_empty() {
                return Err(DomainError::GraphIntegrity(format!(
                    "node {} is not an ending but has no options",
                    node.id
                )));
            }
            if let Some(dangling) = node
                .presented_options()
                .iter()
                .find(|option| !by_id.contains_key(&option.target))
            {
                return Err(DomainError::GraphIntegrity(format!(
                    "option \"{}\" of node {} targets missing node {}",
                    dangling.text, node.id, dangling.target
                )));
            }
        }

        Ok(Self {
            root,
            nodes: by_id,
        })
    }

    /// Identifier of the entry node.
    #[must_use]
    pub fn root_id(&self) -> &NodeId {
        &self.root
    }

    /// Looks up a node.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::GraphIntegrity` if the node is not in the graph.
    pub fn node(&self, id: &NodeId) -> Result<&StoryNode, DomainError> {
        self.nodes
            .get(id)
            .ok_or_else(|| DomainError::GraphIntegrity(format!("node {id} is not in the graph")))
    }

    /// Returns true if `id` is a node of this graph.
    #[must_use]
    pub fn contains(&self, id: &NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    /// Number of nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Always false for a validated graph, which contains at least its root.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// A generated story ready to be played.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Story {
    /// Story identifier.
    pub id: StoryId,
    /// Title shown above the story.
    pub title: String,
    /// The node graph, shared with any engine walking it.
    pub graph: Arc<StoryGraph>,
}

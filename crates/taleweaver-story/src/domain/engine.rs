//! Story graph traversal engine.
//!
//! The engine owns a cursor into a shared, immutable [`StoryGraph`]. It never
//! mutates the graph and keeps no history: revisiting a node through a cycle
//! yields exactly the same view as the first visit.

use std::sync::Arc;

use taleweaver_core::error::DomainError;
use taleweaver_core::ids::NodeId;
use tracing::debug;

use super::graph::{StoryGraph, StoryOption};

/// What the player sees while standing on a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeView<'a> {
    /// The node being viewed.
    pub node_id: &'a NodeId,
    /// Narrative text.
    pub content: &'a str,
    /// Whether the story ends here.
    pub is_ending: bool,
    /// Whether this is a winning ending; always false for non-endings.
    pub is_winning_ending: bool,
    /// Options to offer, empty for endings.
    pub options: &'a [StoryOption],
}

/// Walks a story graph from its root as options are chosen.
#[derive(Debug, Clone)]
pub struct StoryGraphEngine {
    graph: Arc<StoryGraph>,
    cursor: NodeId,
}

impl StoryGraphEngine {
    /// Creates an engine positioned on the root of `graph`.
    #[must_use]
    pub fn new(graph: Arc<StoryGraph>) -> Self {
        let cursor = graph.root_id().clone();
        Self { graph, cursor }
    }

    /// Replaces the graph and moves the cursor to its root.
    pub fn initialize(&mut self, graph: Arc<StoryGraph>) {
        self.cursor = graph.root_id().clone();
        self.graph = graph;
        debug!(node_id = %self.cursor, "story engine initialized");
    }

    /// The graph being walked.
    #[must_use]
    pub fn graph(&self) -> &Arc<StoryGraph> {
        &self.graph
    }

    /// The node the cursor is on.
    #[must_use]
    pub fn current_node_id(&self) -> &NodeId {
        &self.cursor
    }

    /// Returns true when the cursor is on the root.
    #[must_use]
    pub fn is_at_root(&self) -> bool {
        &self.cursor == self.graph.root_id()
    }

    /// Derives the view of the current node.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::GraphIntegrity` if the cursor points outside the
    /// graph, which a validated graph rules out.
    pub fn current_view(&self) -> Result<NodeView<'_>, DomainError> {
        let node = self.graph.node(&self.cursor)?;
        Ok(NodeView {
            node_id: &node.id,
            content: &node.content,
            is_ending: node.is_ending,
            is_winning_ending: node.is_ending && node.is_winning_ending,
            options: node.presented_options(),
        })
    }

    /// Moves the cursor along the option leading to `target`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidTransition` if `target` is not one of the
    /// current node's presented options; the cursor does not move.
    pub fn choose(&mut self, target: &NodeId) -> Result<NodeView<'_>, DomainError> {
        let offered = self
            .current_view()?
            .options
            .iter()
            .any(|option| &option.target == target);
        if !offered {
            return Err(DomainError::InvalidTransition {
                from: self.cursor.clone(),
                to: target.clone(),
            });
        }

        debug!(from = %self.cursor, to = %target, "option chosen");
        self.cursor = target.clone();
        self.current_view()
    }

    /// Moves the cursor along the option at `index` of the current view.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidTransition` if there is no such option.
    pub fn choose_index(&mut self, index: usize) -> Result<NodeView<'_>, DomainError> {
        let target = self
            .current_view()?
            .options
            .get(index)
            .map(|option| option.target.clone());
        match target {
            Some(target) => self.choose(&target),
            None => Err(DomainError::InvalidTransition {
                from: self.cursor.clone(),
                to: NodeId::new(format!("option #{}", index + 1)),
            }),
        }
    }

    /// Moves the cursor back to the root. Always succeeds.
    pub fn restart(&mut self) {
        self.cursor = self.graph.root_id().clone();
        debug!(node_id = %self.cursor, "story restarted");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::graph::StoryNode;

    fn option(text: &str, target: &str) -> StoryOption {
        StoryOption {
            text: text.to_owned(),
            target: NodeId::from(target),
        }
    }

    fn winning_graph() -> Arc<StoryGraph> {
        let nodes = vec![
            StoryNode {
                id: NodeId::from("root"),
                content: "A fork in the road.".to_owned(),
                is_ending: false,
                is_winning_ending: false,
                options: vec![option("go left", "a")],
            },
            StoryNode {
                id: NodeId::from("a"),
                content: "You win".to_owned(),
                is_ending: true,
                is_winning_ending: true,
                options: Vec::new(),
            },
        ];
        Arc::new(StoryGraph::new(NodeId::from("root"), nodes).unwrap())
    }

    fn cyclic_graph() -> Arc<StoryGraph> {
        let nodes = vec![
            StoryNode {
                id: NodeId::from("entrance"),
                content: "A cave mouth.".to_owned(),
                is_ending: false,
                is_winning_ending: false,
                options: vec![option("Enter", "hall"), option("Leave", "home")],
            },
            StoryNode {
                id: NodeId::from("hall"),
                content: "A torch-lit hall.".to_owned(),
                is_ending: false,
                is_winning_ending: false,
                options: vec![option("Go back", "entrance")],
            },
            StoryNode {
                id: NodeId::from("home"),
                content: "You head home.".to_owned(),
                is_ending: true,
                is_winning_ending: false,
                options: vec![option("Sneak back", "entrance")],
            },
        ];
        Arc::new(StoryGraph::new(NodeId::from("entrance"), nodes).unwrap())
    }

    #[test]
    fn test_new_engine_starts_at_root() {
        // Arrange
        let engine = StoryGraphEngine::new(winning_graph());

        // Act
        let view = engine.current_view().unwrap();

        // Assert
        assert!(engine.is_at_root());
        assert_eq!(view.content, "A fork in the road.");
        assert!(!view.is_ending);
        assert_eq!(view.options.len(), 1);
    }

    #[test]
    fn test_choosing_winning_option_reaches_winning_ending() {
        // Arrange
        let mut engine = StoryGraphEngine::new(winning_graph());

        // Act
        let view = engine.choose(&NodeId::from("a")).unwrap();

        // Assert
        assert_eq!(view.content, "You win");
        assert!(view.is_ending);
        assert!(view.is_winning_ending);
        assert!(view.options.is_empty());
    }

    #[test]
    fn test_choose_rejects_target_not_offered() {
        // Arrange
        let mut engine = StoryGraphEngine::new(cyclic_graph());

        // Act
        let result = engine.choose(&NodeId::from("home-2"));

        // Assert
        assert_eq!(
            result.unwrap_err(),
            DomainError::InvalidTransition {
                from: NodeId::from("entrance"),
                to: NodeId::from("home-2"),
            }
        );
        assert_eq!(engine.current_node_id(), &NodeId::from("entrance"));
    }

    #[test]
    fn test_choose_rejects_existing_node_that_is_not_adjacent() {
        let mut engine = StoryGraphEngine::new(cyclic_graph());
        engine.choose(&NodeId::from("hall")).unwrap();

        let result = engine.choose(&NodeId::from("home"));

        assert!(matches!(
            result,
            Err(DomainError::InvalidTransition { .. })
        ));
        assert_eq!(engine.current_node_id(), &NodeId::from("hall"));
    }

    #[test]
    fn test_ending_hides_listed_options_and_rejects_choices() {
        // Arrange
        let mut engine = StoryGraphEngine::new(cyclic_graph());
        engine.choose(&NodeId::from("home")).unwrap();

        // Act
        let view = engine.current_view().unwrap();
        let options_empty = view.options.is_empty();
        let result = engine.choose(&NodeId::from("entrance"));

        // Assert
        assert!(options_empty);
        assert!(matches!(result, Err(DomainError::InvalidTransition { .. })));
    }

    #[test]
    fn test_cycle_revisit_yields_identical_view() {
        // Arrange
        let mut engine = StoryGraphEngine::new(cyclic_graph());
        let first = engine.current_view().unwrap().to_owned_parts();

        // Act
        for _ in 0..100 {
            engine.choose(&NodeId::from("hall")).unwrap();
            engine.choose(&NodeId::from("entrance")).unwrap();
        }
        let again = engine.current_view().unwrap().to_owned_parts();

        // Assert
        assert_eq!(first, again);
    }

    #[test]
    fn test_restart_returns_to_root_from_anywhere() {
        // Arrange
        let mut engine = StoryGraphEngine::new(cyclic_graph());
        engine.choose(&NodeId::from("hall")).unwrap();

        // Act
        engine.restart();
        engine.restart();

        // Assert
        assert!(engine.is_at_root());
        assert_eq!(engine.current_view().unwrap().content, "A cave mouth.");
    }

    #[test]
    fn test_initialize_resets_cursor_to_new_root() {
        // Arrange
        let mut engine = StoryGraphEngine::new(cyclic_graph());
        engine.choose(&NodeId::from("hall")).unwrap();

        let replacement = winning_graph();

        // Act
        engine.initialize(Arc::clone(&replacement));

        // Assert
        assert!(Arc::ptr_eq(engine.graph(), &replacement));
        assert_eq!(engine.current_node_id(), &NodeId::from("root"));
        assert_eq!(engine.current_view().unwrap().content, "A fork in the road.");
    }

    #[test]
    fn test_choose_index_follows_option_order() {
        let mut engine = StoryGraphEngine::new(cyclic_graph());

        let view = engine.choose_index(1).unwrap();

        assert_eq!(view.node_id, &NodeId::from("home"));
    }

    #[test]
    fn test_choose_index_out_of_range_is_invalid() {
        let mut engine = StoryGraphEngine::new(cyclic_graph());

        let result = engine.choose_index(5);

        assert!(matches!(result, Err(DomainError::InvalidTransition { .. })));
        assert!(engine.is_at_root());
    }

    impl NodeView<'_> {
        fn to_owned_parts(self) -> (NodeId, String, bool, bool, Vec<StoryOption>) {
            (
                self.node_id.clone(),
                self.content.to_owned(),
                self.is_ending,
                self.is_winning_ending,
                self.options.to_vec(),
            )
        }
    }
}

//! Wire representations of the backend's JSON contract.
//!
//! These types mirror the payloads exactly as the backend sends them. The
//! job and story contexts decode them into their typed domain models.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// An identifier as it appears on the wire: the backend emits integer
/// primary keys, but string ids are accepted as well.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WireId {
    /// A numeric identifier.
    Int(i64),
    /// A string identifier.
    Text(String),
}

impl fmt::Display for WireId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(value) => write!(f, "{value}"),
            Self::Text(value) => f.write_str(value),
        }
    }
}

impl From<&str> for WireId {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

/// Request body for `POST /stories/create`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateStoryRequest {
    /// The theme the story is generated from.
    pub theme: String,
}

/// Response body of `POST /stories/create`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobTicket {
    /// Identifier of the queued job.
    pub job_id: String,
    /// Initial status reported by the backend.
    #[serde(default)]
    pub status: Option<String>,
}

/// Response body of `GET /jobs/{job_id}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStatusResponse {
    /// Raw status string; absent or unrecognized values mean "still working".
    #[serde(default)]
    pub status: Option<String>,
    /// Identifier of the generated story, present once completed.
    #[serde(default)]
    pub story_id: Option<WireId>,
    /// Failure message, present once failed.
    #[serde(default, rename = "jobError", alias = "error")]
    pub job_error: Option<String>,
}

/// A single choice on a story node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireStoryOption {
    /// Label presented to the player.
    pub text: String,
    /// The node this option leads to.
    #[serde(default, alias = "target_node_id")]
    pub node_id: Option<WireId>,
}

/// A story node as sent by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireStoryNode {
    /// Node identifier.
    pub id: WireId,
    /// Narrative text.
    #[serde(default)]
    pub content: String,
    /// Whether this node ends the story.
    #[serde(default)]
    pub is_ending: bool,
    /// Whether this ending is a winning one.
    #[serde(default)]
    pub is_winning_ending: bool,
    /// Choices leading out of this node.
    #[serde(default)]
    pub options: Vec<WireStoryOption>,
}

/// Response body of `GET /stories/{story_id}/complete`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompleteStoryResponse {
    /// Story identifier.
    pub id: WireId,
    /// Story title.
    #[serde(default)]
    pub title: String,
    /// The entry node.
    #[serde(alias = "root_nodes")]
    pub root_node: WireStoryNode,
    /// Every node of the story keyed by its id.
    pub all_nodes: HashMap<String, WireStoryNode>,
}

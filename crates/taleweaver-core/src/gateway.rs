//! Story backend gateway abstraction.

use async_trait::async_trait;
use thiserror::Error;

use crate::ids::{JobId, StoryId};
use crate::wire::{CompleteStoryResponse, CreateStoryRequest, JobStatusResponse, JobTicket};

/// Transport-level failures reported by a gateway implementation.
///
/// The domain decides what each failure means: a `NotFound` while polling is
/// terminal, while any other variant is retried on the next tick.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    /// The backend answered 404 for the requested resource.
    #[error("not found: {0}")]
    NotFound(String),

    /// The backend answered with another non-success status code.
    #[error("backend returned {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// The request never produced a response (connect, DNS, TLS, timeout).
    #[error("transport error: {0}")]
    Transport(String),

    /// The response body did not match the expected shape.
    #[error("malformed response: {0}")]
    Decode(String),
}

impl GatewayError {
    /// Returns true when the backend reported the resource as missing.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Client-side port to the story generation backend.
///
/// Timeouts and retries of individual calls belong to the implementation;
/// callers see one result per call.
#[async_trait]
pub trait StoryGateway: Send + Sync {
    /// Submits a generation request and returns the queued job.
    async fn create_job(&self, request: &CreateStoryRequest) -> Result<JobTicket, GatewayError>;

    /// Queries the current status of a job.
    async fn job_status(&self, job_id: &JobId) -> Result<JobStatusResponse, GatewayError>;

    /// Fetches a completed story with its full node graph.
    async fn complete_story(
        &self,
        story_id: &StoryId,
    ) -> Result<CompleteStoryResponse, GatewayError>;
}

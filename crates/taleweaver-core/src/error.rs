//! Domain error types.

use thiserror::Error;

use crate::ids::{JobId, NodeId, StoryId};

/// Top-level domain error type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    /// The theme was rejected locally or the create-job request failed.
    #[error("{0}")]
    Submission(String),

    /// The job disappeared or never existed on the backend.
    #[error("job not found: {0}")]
    JobNotFound(JobId),

    /// The backend reported that generation failed.
    #[error("{message}")]
    JobFailed {
        /// The job that failed.
        job_id: JobId,
        /// Message reported by the backend, or the generic fallback.
        message: String,
    },

    /// A polling failure that is retried on the next tick.
    #[error("transient poll failure: {0}")]
    TransientPoll(String),

    /// Too many consecutive transient polling failures.
    #[error("gave up polling job {job_id} after {attempts} consecutive failures: {last_error}")]
    PollRetriesExhausted {
        /// The job being polled.
        job_id: JobId,
        /// Number of consecutive failures observed.
        attempts: u32,
        /// The most recent transport error.
        last_error: String,
    },

    /// A choice targeted a node that is not an option of the current node.
    #[error("invalid transition from node {from} to node {to}")]
    InvalidTransition {
        /// The node the cursor was on.
        from: NodeId,
        /// The requested target.
        to: NodeId,
    },

    /// The story graph violates a structural invariant.
    #[error("story graph integrity error: {0}")]
    GraphIntegrity(String),

    /// The requested story does not exist.
    #[error("story not found: {0}")]
    StoryNotFound(StoryId),

    /// An infrastructure/transport error.
    #[error("infrastructure error: {0}")]
    Infrastructure(String),
}

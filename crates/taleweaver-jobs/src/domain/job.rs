//! The generation job as seen by the client.

use std::fmt;

use taleweaver_core::ids::{JobId, StoryId};
use taleweaver_core::wire::JobStatusResponse;

/// Status of a generation job.
///
/// The backend owns the full set of values. Only `Completed` and `Failed`
/// are terminal; everything else, including values this client does not
/// recognize and a missing status, means the job is still being worked on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    /// Accepted but not yet picked up.
    Pending,
    /// Waiting in the backend's queue.
    Queued,
    /// Being generated.
    Processing,
    /// Generation finished.
    Completed,
    /// Generation failed.
    Failed,
    /// A status value this client does not know, or none at all.
    Unrecognized(Option<String>),
}

impl JobStatus {
    /// Decodes the raw status string of a poll response.
    #[must_use]
    pub fn from_wire(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            Some("pending") => Self::Pending,
            Some("queued") => Self::Queued,
            Some("processing") => Self::Processing,
            Some("completed") => Self::Completed,
            Some("failed") => Self::Failed,
            other => Self::Unrecognized(other.map(str::to_owned)),
        }
    }

    /// Returns true for `Completed` and `Failed`.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => f.write_str("pending"),
            Self::Queued => f.write_str("queued"),
            Self::Processing => f.write_str("processing"),
            Self::Completed => f.write_str("completed"),
            Self::Failed => f.write_str("failed"),
            Self::Unrecognized(Some(raw)) => write!(f, "unrecognized({raw})"),
            Self::Unrecognized(None) => f.write_str("missing"),
        }
    }
}

/// What a single poll tells the client to do next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    /// Keep polling.
    InProgress,
    /// The story is ready.
    Completed(StoryId),
    /// Generation failed, with the backend's message if it sent one.
    Failed(Option<String>),
}

/// A job decoded from a poll response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    /// Backend-issued identifier.
    pub id: JobId,
    /// Decoded status.
    pub status: JobStatus,
    /// Generated story, meaningful only when completed.
    pub result_story_id: Option<StoryId>,
    /// Failure message, meaningful only when failed.
    pub error_message: Option<String>,
}

impl Job {
    /// Decodes a poll response for `id`.
    #[must_use]
    pub fn from_response(id: JobId, response: JobStatusResponse) -> Self {
        Self {
            id,
            status: JobStatus::from_wire(response.status.as_deref()),
            result_story_id: response.story_id.map(|s| StoryId::new(s.to_string())),
            error_message: response.job_error.filter(|m| !m.trim().is_empty()),
        }
    }

    /// Classifies this job.
    ///
    /// A `completed` job without a story id cannot be handed off, so it is
    /// reported as still in progress.
    #[must_use]
    pub fn outcome(&self) -> JobOutcome {
        match (&self.status, &self.result_story_id) {
            (JobStatus::Completed, Some(story_id)) => JobOutcome::Completed(story_id.clone()),
            (JobStatus::Failed, _) => JobOutcome::Failed(self.error_message.clone()),
            (
                JobStatus::Pending
                | JobStatus::Queued
                | JobStatus::Processing
                | JobStatus::Completed
                | JobStatus::Unrecognized(_),
                _,
            ) => JobOutcome::InProgress,
        }
    }
}

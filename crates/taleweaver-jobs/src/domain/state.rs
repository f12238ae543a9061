//! Lifecycle state machine of a single generation job.
//!
//! `idle → submitting → processing → {completed | failed}`. Every transition
//! out of `submitting` or `processing` is tagged with the epoch that started
//! it; `reset` and new submissions bump the epoch, so a late response from a
//! discarded job can never overwrite the current state.

use taleweaver_core::error::DomainError;
use taleweaver_core::ids::{JobId, StoryId};

use super::job::{Job, JobOutcome};

/// Message shown when the backend reports a failure without details.
pub const GENERIC_FAILURE_MESSAGE: &str = "Failed to generate story";

/// Why a job ended in failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobFailure {
    /// The create-job request failed; no job exists.
    Submission(String),
    /// The backend no longer knows the job.
    NotFound,
    /// The backend reported the job as failed.
    Reported(String),
    /// Polling gave up after too many consecutive transient failures.
    RetriesExhausted {
        /// Consecutive failures observed.
        attempts: u32,
        /// The last transport error.
        last_error: String,
    },
}

impl JobFailure {
    /// The text shown to the user.
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::Submission(message) | Self::Reported(message) => message.clone(),
            Self::NotFound => "Failed to check job status: job not found".to_owned(),
            Self::RetriesExhausted {
                attempts,
                last_error,
            } => format!("Failed to check job status after {attempts} attempts: {last_error}"),
        }
    }

    fn into_error(self, job_id: Option<JobId>) -> DomainError {
        match (self, job_id) {
            (Self::NotFound, Some(job_id)) => DomainError::JobNotFound(job_id),
            (Self::Reported(message), Some(job_id)) => DomainError::JobFailed { job_id, message },
            (
                Self::RetriesExhausted {
                    attempts,
                    last_error,
                },
                Some(job_id),
            ) => DomainError::PollRetriesExhausted {
                job_id,
                attempts,
                last_error,
            },
            (failure, _) => DomainError::Submission(failure.message()),
        }
    }
}

/// Observable phase of the job lifecycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum JobPhase {
    /// Nothing submitted.
    #[default]
    Idle,
    /// The create-job request is outstanding.
    Submitting,
    /// The job exists and is being polled.
    Processing {
        /// The job being polled.
        job_id: JobId,
    },
    /// The story is ready for hand-off.
    Completed {
        /// The finished job.
        job_id: JobId,
        /// The generated story.
        story_id: StoryId,
    },
    /// Submission or generation failed.
    Failed {
        /// The job, if submission got far enough to create one.
        job_id: Option<JobId>,
        /// What went wrong.
        failure: JobFailure,
    },
}

impl JobPhase {
    /// Short name for logging.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Submitting => "submitting",
            Self::Processing { .. } => "processing",
            Self::Completed { .. } => "completed",
            Self::Failed { .. } => "failed",
        }
    }

    /// Returns true for `Completed` and `Failed`.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed { .. } | Self::Failed { .. })
    }

    /// Returns true while a submission or poll loop owns the job.
    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Submitting | Self::Processing { .. })
    }

    /// The job id, once one has been issued.
    #[must_use]
    pub fn job_id(&self) -> Option<&JobId> {
        match self {
            Self::Processing { job_id } | Self::Completed { job_id, .. } => Some(job_id),
            Self::Failed { job_id, .. } => job_id.as_ref(),
            Self::Idle | Self::Submitting => None,
        }
    }
}

/// Result of applying one poll response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollTransition {
    /// The response belongs to a discarded job or arrived after the job left
    /// `processing`; nothing changed.
    Ignored,
    /// The job is still being generated.
    StillProcessing,
    /// The poll failed in a way that is retried on the next tick.
    TransientFailure {
        /// Consecutive transient failures so far.
        attempts: u32,
    },
    /// The job completed.
    Completed(StoryId),
    /// The job failed.
    Failed(JobFailure),
}

impl PollTransition {
    /// Returns true when no further poll should be scheduled.
    #[must_use]
    pub fn stops_polling(&self) -> bool {
        matches!(self, Self::Ignored | Self::Completed(_) | Self::Failed(_))
    }

    /// Returns true when the transition changed the observable phase.
    #[must_use]
    pub fn changes_phase(&self) -> bool {
        matches!(self, Self::Completed(_) | Self::Failed(_))
    }
}

/// Complete client-side state of the current generation job.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobState {
    phase: JobPhase,
    theme: Option<String>,
    epoch: u64,
    transient_failures: u32,
}

impl JobState {
    /// Creates an idle state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current phase.
    #[must_use]
    pub fn phase(&self) -> &JobPhase {
        &self.phase
    }

    /// Theme of the current or last submission.
    #[must_use]
    pub fn theme(&self) -> Option<&str> {
        self.theme.as_deref()
    }

    /// Epoch of the current submission.
    #[must_use]
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Consecutive transient poll failures since the last good response.
    #[must_use]
    pub fn transient_failures(&self) -> u32 {
        self.transient_failures
    }

    /// User-facing error text when failed.
    #[must_use]
    pub fn error_message(&self) -> Option<String> {
        match &self.phase {
            JobPhase::Failed { failure, .. } => Some(failure.message()),
            _ => None,
        }
    }

    /// The terminal result, or `None` while not terminal.
    #[must_use]
    pub fn outcome(&self) -> Option<Result<StoryId, DomainError>> {
        match &self.phase {
            JobPhase::Completed { story_id, .. } => Some(Ok(story_id.clone())),
            JobPhase::Failed { job_id, failure } => {
                Some(Err(failure.clone().into_error(job_id.clone())))
            }
            JobPhase::Idle | JobPhase::Submitting | JobPhase::Processing { .. } => None,
        }
    }

    /// Starts a submission for `theme` and returns its epoch.
    ///
    /// Allowed from `idle` and from either terminal phase; a previous
    /// terminal result is discarded.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Submission` if the theme is blank or another
    /// job is still active. The state is left untouched in both cases.
    pub fn begin_submission(&mut self, theme: &str) -> Result<u64, DomainError> {
        let theme = theme.trim();
        if theme.is_empty() {
            return Err(DomainError::Submission("Theme cannot be empty".to_owned()));
        }
        if self.phase.is_active() {
            return Err(DomainError::Submission(
                "A story is already being generated".to_owned(),
            ));
        }

        self.epoch += 1;
        self.phase = JobPhase::Submitting;
        self.theme = Some(theme.to_owned());
        self.transient_failures = 0;
        Ok(self.epoch)
    }

    /// Records that the backend accepted the submission of `epoch`.
    ///
    /// Returns false if the submission was discarded in the meantime.
    pub fn accept_submission(&mut self, epoch: u64, job_id: JobId) -> bool {
        if epoch != self.epoch || self.phase != JobPhase::Submitting {
            return false;
        }
        self.phase = JobPhase::Processing { job_id };
        true
    }

    /// Records that the submission of `epoch` failed.
    ///
    /// Returns false if the submission was discarded in the meantime.
    pub fn reject_submission(&mut self, epoch: u64, reason: &str) -> bool {
        if epoch != self.epoch || self.phase != JobPhase::Submitting {
            return false;
        }
        self.phase = JobPhase::Failed {
            job_id: None,
            failure: JobFailure::Submission(format!("{GENERIC_FAILURE_MESSAGE}: {reason}")),
        };
        true
    }

    /// Applies the result of one poll issued during `epoch`.
    ///
    /// `result` is either the decoded job or the classified poll error:
    /// `DomainError::JobNotFound` is terminal, any other error is transient.
    /// With `retry_limit` set, the `retry_limit`-th consecutive transient
    /// failure becomes terminal too.
    pub fn apply_poll(
        &mut self,
        epoch: u64,
        result: Result<Job, DomainError>,
        retry_limit: Option<u32>,
    ) -> PollTransition {
        let job_id = match &self.phase {
            JobPhase::Processing { job_id } if epoch == self.epoch => job_id.clone(),
            _ => return PollTransition::Ignored,
        };

        let transition = match result {
            Ok(job) => match job.outcome() {
                JobOutcome::InProgress => {
                    self.transient_failures = 0;
                    PollTransition::StillProcessing
                }
                JobOutcome::Completed(story_id) => PollTransition::Completed(story_id),
                JobOutcome::Failed(message) => PollTransition::Failed(JobFailure::Reported(
                    message.unwrap_or_else(|| GENERIC_FAILURE_MESSAGE.to_owned()),
                )),
            },
            Err(DomainError::JobNotFound(_)) => PollTransition::Failed(JobFailure::NotFound),
            Err(error) => {
                self.transient_failures = self.transient_failures.saturating_add(1);
                let attempts = self.transient_failures;
                match retry_limit {
                    Some(limit) if attempts >= limit => {
                        PollTransition::Failed(JobFailure::RetriesExhausted {
                            attempts,
                            last_error: error.to_string(),
                        })
                    }
                    _ => PollTransition::TransientFailure { attempts },
                }
            }
        };

        match &transition {
            PollTransition::Completed(story_id) => {
                self.phase = JobPhase::Completed {
                    job_id,
                    story_id: story_id.clone(),
                };
            }
            PollTransition::Failed(failure) => {
                self.phase = JobPhase::Failed {
                    job_id: Some(job_id),
                    failure: failure.clone(),
                };
            }
            PollTransition::Ignored
            | PollTransition::StillProcessing
            | PollTransition::TransientFailure { .. } => {}
        }
        transition
    }

    /// Discards all job state and returns to `idle`.
    pub fn reset(&mut self) {
        self.epoch += 1;
        self.phase = JobPhase::Idle;
        self.theme = None;
        self.transient_failures = 0;
    }
}

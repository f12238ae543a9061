//! Job poller: drives a submitted theme to a terminal outcome.
//!
//! The poller owns at most one background poll task. The task issues a
//! status query, waits for it to resolve, applies it, and only then sleeps
//! for the poll interval, so two queries are never outstanding at once. The
//! task is cancelled when the job reaches a terminal phase, on `reset`, on
//! `shutdown`, and when the poller is dropped.

use std::sync::Arc;
use std::time::Duration;

use taleweaver_core::error::DomainError;
use taleweaver_core::gateway::{GatewayError, StoryGateway};
use taleweaver_core::ids::{JobId, StoryId};
use taleweaver_core::wire::CreateStoryRequest;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, info_span, instrument, warn};
use uuid::Uuid;

use crate::domain::job::{Job, JobStatus};
use crate::domain::state::{JobPhase, JobState, PollTransition};

/// Default delay between two status queries.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Tunable parameters of the poll loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollerConfig {
    /// Delay between the resolution of one query and the next query.
    pub poll_interval: Duration,
    /// Consecutive transient failures after which the job is failed.
    /// `None` retries forever.
    pub max_consecutive_transient_failures: Option<u32>,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_consecutive_transient_failures: None,
        }
    }
}

/// Maps a gateway failure observed while polling onto the domain taxonomy.
///
/// A 404 means the job is gone and is terminal; everything else is
/// transient.
#[must_use]
pub fn classify_poll_error(job_id: &JobId, error: &GatewayError) -> DomainError {
    if error.is_not_found() {
        DomainError::JobNotFound(job_id.clone())
    } else {
        DomainError::TransientPoll(error.to_string())
    }
}

/// Fails a submission that is still waiting on the backend when dropped,
/// e.g. because the `submit` future was cancelled mid-request. A no-op once
/// the submission was accepted or rejected.
struct PendingSubmission {
    state: Arc<watch::Sender<JobState>>,
    epoch: u64,
}

impl Drop for PendingSubmission {
    fn drop(&mut self) {
        let epoch = self.epoch;
        let abandoned = self
            .state
            .send_if_modified(|state| state.reject_submission(epoch, "request was cancelled"));
        if abandoned {
            warn!(epoch, "story generation request abandoned before the backend answered");
        }
    }
}

#[derive(Debug)]
struct PollTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Owns the lifecycle of one generation job at a time.
pub struct JobPoller {
    gateway: Arc<dyn StoryGateway>,
    config: PollerConfig,
    state: Arc<watch::Sender<JobState>>,
    poll_task: Option<PollTask>,
}

impl std::fmt::Debug for JobPoller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobPoller")
            .field("config", &self.config)
            .field("state", &*self.state.borrow())
            .field("poll_task", &self.poll_task)
            .finish_non_exhaustive()
    }
}

impl JobPoller {
    /// Creates an idle poller.
    #[must_use]
    pub fn new(gateway: Arc<dyn StoryGateway>, config: PollerConfig) -> Self {
        let (state, _) = watch::channel(JobState::new());
        Self {
            gateway,
            config,
            state: Arc::new(state),
            poll_task: None,
        }
    }

    /// A snapshot of the current state.
    #[must_use]
    pub fn state(&self) -> JobState {
        self.state.borrow().clone()
    }

    /// The current phase.
    #[must_use]
    pub fn phase(&self) -> JobPhase {
        self.state.borrow().phase().clone()
    }

    /// Subscribes to state changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<JobState> {
        self.state.subscribe()
    }

    /// Returns true while a poll task is scheduled or running.
    #[must_use]
    pub fn is_polling(&self) -> bool {
        self.poll_task
            .as_ref()
            .is_some_and(|task| !task.handle.is_finished())
    }

    /// Submits `theme` and starts polling the created job.
    ///
    /// The first status query is issued right away; later ones follow at
    /// the configured interval.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Submission` if the theme is blank, a job is
    /// already active, or the create request fails. In the last case the
    /// poller is left in the failed phase.
    #[instrument(skip(self), fields(correlation_id = tracing::field::Empty))]
    pub async fn submit(&mut self, theme: &str) -> Result<JobId, DomainError> {
        let mut begun = Err(DomainError::Submission(String::new()));
        self.state.send_if_modified(|state| {
            begun = state.begin_submission(theme);
            begun.is_ok()
        });
        let epoch = begun?;
        let _pending = PendingSubmission {
            state: Arc::clone(&self.state),
            epoch,
        };
        self.stop_polling();

        let correlation_id = Uuid::new_v4();
        tracing::Span::current().record("correlation_id", tracing::field::display(correlation_id));
        info!(epoch, "submitting story generation request");

        let request = CreateStoryRequest {
            theme: theme.trim().to_owned(),
        };
        let ticket = match self.gateway.create_job(&request).await {
            Ok(ticket) => ticket,
            Err(error) => {
                warn!(error = %error, "story generation request failed");
                let reason = error.to_string();
                self.state
                    .send_if_modified(|state| state.reject_submission(epoch, &reason));
                return Err(DomainError::Submission(format!(
                    "Failed to generate story: {reason}"
                )));
            }
        };

        let job_id = JobId::new(ticket.job_id);
        let accepted = self
            .state
            .send_if_modified(|state| state.accept_submission(epoch, job_id.clone()));
        if !accepted {
            return Err(DomainError::Submission(
                "Submission was discarded before the backend answered".to_owned(),
            ));
        }

        info!(job_id = %job_id, initial_status = ?ticket.status, "job created, polling");
        self.start_polling(job_id.clone(), epoch, correlation_id);
        Ok(job_id)
    }

    /// Waits until the current job reaches a terminal phase.
    ///
    /// # Errors
    ///
    /// Returns the terminal failure as a `DomainError`, or
    /// `DomainError::Infrastructure` if nothing has been submitted.
    pub async fn wait_for_outcome(&self) -> Result<StoryId, DomainError> {
        let mut rx = self.state.subscribe();
        let settled = rx
            .wait_for(|state| state.phase().is_terminal() || *state.phase() == JobPhase::Idle)
            .await
            .map_err(|_| DomainError::Infrastructure("job poller was shut down".to_owned()))?
            .outcome();
        settled.unwrap_or_else(|| {
            Err(DomainError::Infrastructure(
                "no story generation job in progress".to_owned(),
            ))
        })
    }

    /// Cancels polling and returns to `idle`, discarding the job.
    pub fn reset(&mut self) {
        self.stop_polling();
        self.state.send_modify(JobState::reset);
        debug!("job poller reset");
    }

    /// Cancels polling without touching the state. Call when the consuming
    /// context goes away; dropping the poller does the same.
    pub fn shutdown(&mut self) {
        self.stop_polling();
    }

    fn start_polling(&mut self, job_id: JobId, epoch: u64, correlation_id: Uuid) {
        let cancel = CancellationToken::new();
        let span = info_span!("poll_job", job_id = %job_id, %correlation_id);
        let handle = tokio::spawn(
            poll_until_settled(
                Arc::clone(&self.gateway),
                Arc::clone(&self.state),
                job_id,
                epoch,
                self.config,
                cancel.clone(),
            )
            .instrument(span),
        );
        self.poll_task = Some(PollTask { cancel, handle });
    }

    fn stop_polling(&mut self) {
        if let Some(task) = self.poll_task.take() {
            task.cancel.cancel();
            task.handle.abort();
        }
    }
}

impl Drop for JobPoller {
    fn drop(&mut self) {
        self.stop_polling();
    }
}

async fn poll_until_settled(
    gateway: Arc<dyn StoryGateway>,
    state: Arc<watch::Sender<JobState>>,
    job_id: JobId,
    epoch: u64,
    config: PollerConfig,
    cancel: CancellationToken,
) {
    let mut polls = 0u64;
    loop {
        let response = tokio::select! {
            () = cancel.cancelled() => {
                debug!(polls, "poll cancelled while a query was outstanding");
                return;
            }
            response = gateway.job_status(&job_id) => response,
        };
        polls += 1;

        let result = response
            .map(|r| Job::from_response(job_id.clone(), r))
            .map_err(|e| classify_poll_error(&job_id, &e));
        if let Ok(job) = &result {
            debug!(polls, status = %job.status, "job status received");
            if job.status == JobStatus::Completed && job.result_story_id.is_none() {
                warn!("job reported completed without a story id, still waiting");
            }
        }

        let mut transition = PollTransition::Ignored;
        state.send_if_modified(|state| {
            transition =
                state.apply_poll(epoch, result, config.max_consecutive_transient_failures);
            transition.changes_phase()
        });

        match &transition {
            PollTransition::Ignored => debug!("poll response no longer relevant"),
            PollTransition::StillProcessing => {}
            PollTransition::TransientFailure { attempts } => {
                warn!(attempts, "transient poll failure, retrying next tick");
            }
            PollTransition::Completed(story_id) => {
                info!(story_id = %story_id, polls, "story generation completed");
            }
            PollTransition::Failed(failure) => {
                warn!(reason = %failure.message(), polls, "story generation failed");
            }
        }
        if transition.stops_polling() {
            return;
        }

        tokio::select! {
            () = cancel.cancelled() => {
                debug!(polls, "poll schedule cancelled");
                return;
            }
            () = tokio::time::sleep(config.poll_interval) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use taleweaver_test_support::{FailingGateway, ScriptedGateway, fixtures};

    fn poller(gateway: &Arc<ScriptedGateway>) -> JobPoller {
        JobPoller::new(Arc::clone(gateway) as Arc<dyn StoryGateway>, PollerConfig::default())
    }

    #[tokio::test(start_paused = true)]
    async fn test_submit_moves_to_processing_and_polls_once() {
        // Arrange
        let gateway = Arc::new(ScriptedGateway::new());
        let mut poller = poller(&gateway);

        // Act
        let job_id = poller.submit("  pirates ").await.unwrap();
        gateway.wait_for_polls(1).await;

        // Assert
        assert_eq!(job_id, JobId::from("job-1"));
        assert_eq!(
            poller.phase(),
            JobPhase::Processing {
                job_id: JobId::from("job-1")
            }
        );
        assert_eq!(gateway.submitted_themes(), vec!["pirates".to_owned()]);
        assert_eq!(gateway.polled_ids(), vec![JobId::from("job-1")]);
        assert!(poller.is_polling());
    }

    #[tokio::test(start_paused = true)]
    async fn test_polls_follow_the_configured_interval() {
        // Arrange
        let gateway = Arc::new(ScriptedGateway::new());
        let mut poller = poller(&gateway);
        poller.submit("pirates").await.unwrap();
        gateway.wait_for_polls(1).await;

        // Act
        tokio::time::sleep(Duration::from_millis(4_900)).await;
        let before_interval = gateway.poll_count();
        tokio::time::sleep(Duration::from_millis(200)).await;
        let after_interval = gateway.poll_count();

        // Assert
        assert_eq!(before_interval, 1);
        assert_eq!(after_interval, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeated_processing_stays_processing() {
        // Arrange
        let gateway = Arc::new(ScriptedGateway::new().with_poll_responses(vec![
            fixtures::processing(),
            fixtures::processing(),
            fixtures::processing(),
        ]));
        let mut poller = poller(&gateway);

        // Act
        poller.submit("pirates").await.unwrap();
        gateway.wait_for_polls(3).await;

        // Assert
        let state = poller.state();
        assert_eq!(state.phase().name(), "processing");
        assert_eq!(state.error_message(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_completion_hands_off_story_and_stops_polling() {
        // Arrange
        let gateway = Arc::new(
            ScriptedGateway::new()
                .with_poll_responses(vec![fixtures::processing(), fixtures::completed("42")]),
        );
        let mut poller = poller(&gateway);

        // Act
        poller.submit("pirates").await.unwrap();
        let outcome = poller.wait_for_outcome().await;
        tokio::time::sleep(Duration::from_secs(60)).await;

        // Assert
        assert_eq!(outcome, Ok(StoryId::from("42")));
        assert_eq!(gateway.poll_count(), 2);
        assert!(!poller.is_polling());
    }

    #[tokio::test(start_paused = true)]
    async fn test_backend_failure_exposes_message_and_stops_polling() {
        // Arrange
        let gateway = Arc::new(
            ScriptedGateway::new().with_poll_responses(vec![fixtures::failed(Some(
                "theme rejected",
            ))]),
        );
        let mut poller = poller(&gateway);

        // Act
        poller.submit("pirates").await.unwrap();
        let outcome = poller.wait_for_outcome().await;
        tokio::time::sleep(Duration::from_secs(60)).await;

        // Assert
        assert_eq!(
            outcome,
            Err(DomainError::JobFailed {
                job_id: JobId::from("job-1"),
                message: "theme rejected".to_owned(),
            })
        );
        assert_eq!(
            poller.state().error_message().as_deref(),
            Some("theme rejected")
        );
        assert_eq!(gateway.poll_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_not_found_is_terminal() {
        // Arrange
        let gateway = Arc::new(
            ScriptedGateway::new()
                .with_poll_responses(vec![fixtures::processing()])
                .with_poll_error(GatewayError::NotFound("job job-1".into())),
        );
        let mut poller = poller(&gateway);

        // Act
        poller.submit("pirates").await.unwrap();
        let outcome = poller.wait_for_outcome().await;

        // Assert
        assert_eq!(outcome, Err(DomainError::JobNotFound(JobId::from("job-1"))));
        assert_eq!(poller.phase().name(), "failed");
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_errors_are_retried_next_tick() {
        // Arrange
        let gateway = Arc::new(
            ScriptedGateway::new()
                .with_poll_error(GatewayError::Transport("connection reset".into()))
                .with_poll_error(GatewayError::Status {
                    status: 502,
                    body: "bad gateway".into(),
                })
                .with_poll_responses(vec![fixtures::completed("42")]),
        );
        let mut poller = poller(&gateway);

        // Act
        poller.submit("pirates").await.unwrap();
        let outcome = poller.wait_for_outcome().await;

        // Assert
        assert_eq!(outcome, Ok(StoryId::from("42")));
        assert_eq!(gateway.poll_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_cap_fails_job_after_consecutive_poll_errors() {
        // Arrange
        let gateway = Arc::new(
            ScriptedGateway::new()
                .with_poll_error(GatewayError::Transport("down".into()))
                .with_poll_error(GatewayError::Transport("down".into()))
                .with_poll_error(GatewayError::Transport("down".into())),
        );
        let config = PollerConfig {
            max_consecutive_transient_failures: Some(3),
            ..PollerConfig::default()
        };
        let mut poller = JobPoller::new(Arc::clone(&gateway) as Arc<dyn StoryGateway>, config);

        // Act
        poller.submit("pirates").await.unwrap();
        let outcome = poller.wait_for_outcome().await;
        tokio::time::sleep(Duration::from_secs(60)).await;

        // Assert
        assert!(matches!(
            outcome,
            Err(DomainError::PollRetriesExhausted { attempts: 3, .. })
        ));
        assert_eq!(gateway.poll_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_backend_never_has_two_polls_in_flight() {
        // Arrange
        let gateway = Arc::new(ScriptedGateway::new().with_poll_delay(Duration::from_secs(12)));
        let mut poller = poller(&gateway);

        // Act
        poller.submit("pirates").await.unwrap();
        gateway.wait_for_polls(5).await;

        // Assert
        assert_eq!(gateway.max_in_flight(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_cancels_polling_and_returns_to_idle() {
        // Arrange
        let gateway = Arc::new(ScriptedGateway::new().with_poll_delay(Duration::from_secs(2)));
        let mut poller = poller(&gateway);
        poller.submit("pirates").await.unwrap();
        gateway.wait_for_polls(1).await;

        // Act
        poller.reset();
        tokio::time::sleep(Duration::from_secs(60)).await;

        // Assert
        assert_eq!(poller.phase(), JobPhase::Idle);
        assert_eq!(poller.state().theme(), None);
        assert_eq!(gateway.poll_count(), 1);
        assert!(!poller.is_polling());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_poller_stops_polling() {
        // Arrange
        let gateway = Arc::new(ScriptedGateway::new());
        let mut poller = poller(&gateway);
        poller.submit("pirates").await.unwrap();
        gateway.wait_for_polls(1).await;

        // Act
        drop(poller);
        tokio::time::sleep(Duration::from_secs(60)).await;

        // Assert
        assert_eq!(gateway.poll_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_blank_theme_is_rejected_without_request() {
        // Arrange
        let gateway = Arc::new(ScriptedGateway::new());
        let mut poller = poller(&gateway);

        // Act
        let result = poller.submit("   ").await;

        // Assert
        assert_eq!(
            result,
            Err(DomainError::Submission("Theme cannot be empty".to_owned()))
        );
        assert_eq!(poller.phase(), JobPhase::Idle);
        assert!(gateway.submitted_themes().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_failure_enters_failed_without_polling() {
        // Arrange
        let gateway = Arc::new(ScriptedGateway::new().with_create_error(GatewayError::Status {
            status: 500,
            body: "generator unavailable".into(),
        }));
        let mut poller = poller(&gateway);

        // Act
        let result = poller.submit("pirates").await;
        tokio::time::sleep(Duration::from_secs(30)).await;

        // Assert
        assert!(matches!(result, Err(DomainError::Submission(_))));
        assert_eq!(
            poller.state().error_message().as_deref(),
            Some("Failed to generate story: backend returned 500: generator unavailable")
        );
        assert_eq!(gateway.poll_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_submit_while_processing_is_rejected() {
        let gateway = Arc::new(ScriptedGateway::new());
        let mut poller = poller(&gateway);
        poller.submit("pirates").await.unwrap();

        let second = poller.submit("space").await;

        assert!(matches!(second, Err(DomainError::Submission(_))));
        assert_eq!(gateway.submitted_themes(), vec!["pirates".to_owned()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_then_resubmit_polls_new_job_only() {
        // Arrange
        let gateway = Arc::new(ScriptedGateway::new());
        let mut poller = poller(&gateway);
        poller.submit("pirates").await.unwrap();
        gateway.wait_for_polls(1).await;
        poller.reset();

        // Act
        poller.submit("space").await.unwrap();
        gateway.wait_for_polls(2).await;
        tokio::time::sleep(Duration::from_millis(5_100)).await;

        // Assert
        assert_eq!(gateway.poll_count(), 3);
        assert_eq!(poller.state().theme(), Some("space"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_submit_fails_submission_and_allows_retry() {
        // Arrange
        let gateway =
            Arc::new(ScriptedGateway::new().with_create_delay(Duration::from_secs(3_600)));
        let mut poller = poller(&gateway);

        // Act
        let timed_out =
            tokio::time::timeout(Duration::from_secs(1), poller.submit("pirates")).await;
        let outcome = poller.wait_for_outcome().await;
        let retry = poller.submit("space").await;

        // Assert
        assert!(timed_out.is_err());
        match outcome {
            Err(DomainError::Submission(message)) => {
                assert!(message.contains("request was cancelled"), "{message}");
            }
            other => panic!("expected Submission, got {other:?}"),
        }
        assert_eq!(retry, Ok(JobId::from("job-1")));
        assert_eq!(
            gateway.submitted_themes(),
            vec!["pirates".to_owned(), "space".to_owned()]
        );
    }

    #[tokio::test]
    async fn test_wait_for_outcome_without_submission_errors() {
        let poller = JobPoller::new(Arc::new(FailingGateway), PollerConfig::default());

        let outcome = poller.wait_for_outcome().await;

        assert!(matches!(outcome, Err(DomainError::Infrastructure(_))));
    }

    #[test]
    fn test_classify_poll_error_maps_404_to_not_found() {
        let job_id = JobId::from("job-1");

        assert_eq!(
            classify_poll_error(&job_id, &GatewayError::NotFound("gone".into())),
            DomainError::JobNotFound(job_id.clone())
        );
        assert!(matches!(
            classify_poll_error(&job_id, &GatewayError::Transport("reset".into())),
            DomainError::TransientPoll(_)
        ));
    }
}

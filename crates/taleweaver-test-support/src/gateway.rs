//! Test gateways: mock `StoryGateway` implementations for tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use taleweaver_core::gateway::{GatewayError, StoryGateway};
use taleweaver_core::ids::{JobId, StoryId};
use taleweaver_core::wire::{CompleteStoryResponse, CreateStoryRequest, JobStatusResponse, JobTicket};
use tokio::sync::watch;

use crate::fixtures;

/// A gateway that replays scripted responses and records every call.
///
/// Poll responses are consumed in order; once the script runs dry every
/// further poll answers `processing`. Each poll can be delayed to simulate a
/// slow backend, and the number of concurrently outstanding polls is tracked.
#[derive(Debug)]
pub struct ScriptedGateway {
    ticket: Mutex<Result<JobTicket, GatewayError>>,
    poll_script: Mutex<VecDeque<Result<JobStatusResponse, GatewayError>>>,
    stories: Mutex<HashMap<String, CompleteStoryResponse>>,
    poll_delay: Duration,
    create_delay: Duration,
    submitted: Mutex<Vec<CreateStoryRequest>>,
    polled_ids: Mutex<Vec<JobId>>,
    polls: watch::Sender<usize>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl Default for ScriptedGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedGateway {
    /// Creates a gateway that accepts submissions as job `job-1`.
    #[must_use]
    pub fn new() -> Self {
        let (polls, _) = watch::channel(0);
        Self {
            ticket: Mutex::new(Ok(JobTicket {
                job_id: "job-1".to_owned(),
                status: Some("pending".to_owned()),
            })),
            poll_script: Mutex::new(VecDeque::new()),
            stories: Mutex::new(HashMap::new()),
            poll_delay: Duration::ZERO,
            create_delay: Duration::ZERO,
            submitted: Mutex::new(Vec::new()),
            polled_ids: Mutex::new(Vec::new()),
            polls,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Makes `create_job` fail with `error`.
    #[must_use]
    pub fn with_create_error(self, error: GatewayError) -> Self {
        *self.ticket.lock().unwrap() = Err(error);
        self
    }

    /// Queues successful poll responses.
    #[must_use]
    pub fn with_poll_responses(self, responses: Vec<JobStatusResponse>) -> Self {
        self.poll_script
            .lock()
            .unwrap()
            .extend(responses.into_iter().map(Ok));
        self
    }

    /// Queues a failed poll.
    #[must_use]
    pub fn with_poll_error(self, error: GatewayError) -> Self {
        self.poll_script.lock().unwrap().push_back(Err(error));
        self
    }

    /// Delays every poll response by `delay`.
    #[must_use]
    pub fn with_poll_delay(mut self, delay: Duration) -> Self {
        self.poll_delay = delay;
        self
    }

    /// Delays every `create_job` response by `delay`.
    #[must_use]
    pub fn with_create_delay(mut self, delay: Duration) -> Self {
        self.create_delay = delay;
        self
    }

    /// Serves `story` from `complete_story`.
    #[must_use]
    pub fn with_story(self, story: CompleteStoryResponse) -> Self {
        self.stories
            .lock()
            .unwrap()
            .insert(story.id.to_string(), story);
        self
    }

    /// Number of `job_status` calls started so far.
    #[must_use]
    pub fn poll_count(&self) -> usize {
        *self.polls.borrow()
    }

    /// Highest number of `job_status` calls that were outstanding at once.
    #[must_use]
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Themes received by `create_job`, in order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn submitted_themes(&self) -> Vec<String> {
        self.submitted
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.theme.clone())
            .collect()
    }

    /// Job ids passed to `job_status`, in order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn polled_ids(&self) -> Vec<JobId> {
        self.polled_ids.lock().unwrap().clone()
    }

    /// Waits until at least `count` polls have started.
    ///
    /// # Panics
    ///
    /// Never in practice: the sender lives as long as `self`.
    pub async fn wait_for_polls(&self, count: usize) {
        let mut rx = self.polls.subscribe();
        rx.wait_for(|polls| *polls >= count)
            .await
            .expect("poll counter sender outlives its receivers");
    }
}

/// Decrements the in-flight counter even when the poll future is dropped.
struct InFlightGuard<'a>(&'a AtomicUsize);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl StoryGateway for ScriptedGateway {
    async fn create_job(&self, request: &CreateStoryRequest) -> Result<JobTicket, GatewayError> {
        self.submitted.lock().unwrap().push(request.clone());
        if !self.create_delay.is_zero() {
            tokio::time::sleep(self.create_delay).await;
        }
        self.ticket.lock().unwrap().clone()
    }

    async fn job_status(&self, job_id: &JobId) -> Result<JobStatusResponse, GatewayError> {
        self.polled_ids.lock().unwrap().push(job_id.clone());
        self.polls.send_modify(|polls| *polls += 1);

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlightGuard(&self.in_flight);

        if !self.poll_delay.is_zero() {
            tokio::time::sleep(self.poll_delay).await;
        }

        self.poll_script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(fixtures::processing()))
    }

    async fn complete_story(
        &self,
        story_id: &StoryId,
    ) -> Result<CompleteStoryResponse, GatewayError> {
        self.stories
            .lock()
            .unwrap()
            .get(story_id.as_str())
            .cloned()
            .ok_or_else(|| GatewayError::NotFound(format!("story {story_id}")))
    }
}

/// A gateway whose every call fails with a transport error. Useful for
/// testing error-handling paths.
#[derive(Debug)]
pub struct FailingGateway;

#[async_trait]
impl StoryGateway for FailingGateway {
    async fn create_job(&self, _request: &CreateStoryRequest) -> Result<JobTicket, GatewayError> {
        Err(GatewayError::Transport("connection refused".into()))
    }

    async fn job_status(&self, _job_id: &JobId) -> Result<JobStatusResponse, GatewayError> {
        Err(GatewayError::Transport("connection refused".into()))
    }

    async fn complete_story(
        &self,
        _story_id: &StoryId,
    ) -> Result<CompleteStoryResponse, GatewayError> {
        Err(GatewayError::Transport("connection refused".into()))
    }
}

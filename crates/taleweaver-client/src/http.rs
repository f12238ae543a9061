//! `reqwest`-backed implementation of [`StoryGateway`].
//!
//! Endpoints, relative to the configured base URL (which carries the
//! backend's `/api` prefix):
//!
//! * `POST {base}/stories/create`
//! * `GET {base}/jobs/{job_id}`
//! * `GET {base}/stories/{story_id}/complete`
//!
//! The client keeps a cookie store so the `session_id` cookie set on create
//! is replayed on every later request.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use taleweaver_core::gateway::{GatewayError, StoryGateway};
use taleweaver_core::ids::{JobId, StoryId};
use taleweaver_core::wire::{CompleteStoryResponse, CreateStoryRequest, JobStatusResponse, JobTicket};
use tracing::{debug, instrument};

/// Per-request timeout used when none is configured.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client for a single story backend.
#[derive(Debug, Clone)]
pub struct HttpStoryGateway {
    client: reqwest::Client,
    base_url: String,
}

impl HttpStoryGateway {
    /// Creates a gateway for the backend at `base_url`, e.g.
    /// `http://localhost:8000/api`.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::Transport` if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>, request_timeout: Duration) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(request_timeout)
            .build()
            .map_err(transport_error)?;
        Ok(Self::with_client(client, base_url))
    }

    /// Creates a gateway reusing an existing [`reqwest::Client`].
    ///
    /// The session cookie is only replayed if `client` was built with a
    /// cookie store.
    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_owned();
        Self { client, base_url }
    }

    /// The base URL requests are issued against.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    // ---- private helpers ----

    /// Returns the response unchanged on success. A 404 becomes
    /// [`GatewayError::NotFound`], any other failure status
    /// [`GatewayError::Status`] carrying the body text.
    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, GatewayError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let url = response.url().path().to_owned();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<unreadable body>".to_string());
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(GatewayError::NotFound(url));
        }
        Err(GatewayError::Status {
            status: status.as_u16(),
            body,
        })
    }

    async fn parse_response<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, GatewayError> {
        let response = Self::ensure_success(response).await?;
        response.json::<T>().await.map_err(transport_error)
    }
}

/// Classifies a `reqwest` failure. Body decoding problems are reported as
/// [`GatewayError::Decode`]; everything else is a transport failure.
fn transport_error(error: reqwest::Error) -> GatewayError {
    if error.is_decode() {
        GatewayError::Decode(error.to_string())
    } else {
        GatewayError::Transport(error.to_string())
    }
}

#[async_trait]
impl StoryGateway for HttpStoryGateway {
    #[instrument(skip_all)]
    async fn create_job(&self, request: &CreateStoryRequest) -> Result<JobTicket, GatewayError> {
        let response = self
            .client
            .post(self.url("/stories/create"))
            .json(request)
            .send()
            .await
            .map_err(transport_error)?;

        let ticket: JobTicket = Self::parse_response(response).await?;
        debug!(job_id = %ticket.job_id, "job created");
        Ok(ticket)
    }

    #[instrument(skip_all, fields(job_id = %job_id))]
    async fn job_status(&self, job_id: &JobId) -> Result<JobStatusResponse, GatewayError> {
        let response = self
            .client
            .get(self.url(&format!("/jobs/{job_id}")))
            .send()
            .await
            .map_err(transport_error)?;

        Self::parse_response(response).await
    }

    #[instrument(skip_all, fields(story_id = %story_id))]
    async fn complete_story(
        &self,
        story_id: &StoryId,
    ) -> Result<CompleteStoryResponse, GatewayError> {
        let response = self
            .client
            .get(self.url(&format!("/stories/{story_id}/complete")))
            .send()
            .await
            .map_err(transport_error)?;

        Self::parse_response(response).await
    }
}

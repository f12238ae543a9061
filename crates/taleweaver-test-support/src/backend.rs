//! In-process HTTP backend honouring the story generation contract.
//!
//! Serves `POST /api/stories/create`, `GET /api/jobs/{job_id}` and
//! `GET /api/stories/{story_id}/complete` on an ephemeral local port. Every
//! created job replays the same scripted sequence of statuses; the last
//! status repeats once the script is exhausted.

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use taleweaver_core::wire::{CompleteStoryResponse, CreateStoryRequest, JobStatusResponse, JobTicket};
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::fixtures;

#[derive(Debug, Default)]
struct Inner {
    job_script: Vec<JobStatusResponse>,
    jobs: HashMap<String, VecDeque<JobStatusResponse>>,
    stories: HashMap<String, CompleteStoryResponse>,
    themes: Vec<String>,
    job_polls: usize,
    polls_with_session: usize,
    reject_create: bool,
}

type SharedState = Arc<Mutex<Inner>>;

/// A running fake backend. The server stops when this value is dropped.
#[derive(Debug)]
pub struct FakeBackend {
    addr: SocketAddr,
    state: SharedState,
    task: JoinHandle<()>,
}

impl FakeBackend {
    /// Starts a backend whose jobs report `job_script` and which serves
    /// `stories`.
    ///
    /// # Panics
    ///
    /// Panics if no local port can be bound.
    pub async fn start(
        job_script: Vec<JobStatusResponse>,
        stories: Vec<CompleteStoryResponse>,
    ) -> Self {
        let state: SharedState = Arc::new(Mutex::new(Inner {
            job_script,
            stories: stories
                .into_iter()
                .map(|s| (s.id.to_string(), s))
                .collect(),
            ..Inner::default()
        }));

        let api = Router::new()
            .route("/stories/create", post(create_story))
            .route("/stories/{story_id}/complete", get(complete_story))
            .route("/jobs/{job_id}", get(job_status))
            .with_state(Arc::clone(&state));
        let app = Router::new()
            .nest("/api", api)
            .layer(TraceLayer::new_for_http());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind ephemeral port");
        let addr = listener.local_addr().expect("local address");
        let task = tokio::spawn(async move {
            axum::serve(listener, app).await.expect("fake backend serve");
        });

        Self { addr, state, task }
    }

    /// Base URL to configure clients with, including the `/api` prefix.
    #[must_use]
    pub fn base_url(&self) -> String {
        format!("http://{}/api", self.addr)
    }

    /// Makes every subsequent create request fail with a 500.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn reject_submissions(&self) {
        self.state.lock().unwrap().reject_create = true;
    }

    /// Deletes every known job so further polls answer 404.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn forget_jobs(&self) {
        self.state.lock().unwrap().jobs.clear();
    }

    /// Themes received so far, in order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn themes(&self) -> Vec<String> {
        self.state.lock().unwrap().themes.clone()
    }

    /// Number of job status requests served.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn job_polls(&self) -> usize {
        self.state.lock().unwrap().job_polls
    }

    /// Number of job status requests that carried the session cookie.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn polls_with_session(&self) -> usize {
        self.state.lock().unwrap().polls_with_session
    }
}

impl Drop for FakeBackend {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn not_found(detail: &str) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({ "detail": detail })),
    )
        .into_response()
}

async fn create_story(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(request): Json<CreateStoryRequest>,
) -> Response {
    let mut inner = state.lock().unwrap();
    if inner.reject_create {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "detail": "generator unavailable" })),
        )
            .into_response();
    }

    let job_id = Uuid::new_v4().to_string();
    let script = inner.job_script.iter().cloned().collect();
    inner.jobs.insert(job_id.clone(), script);
    inner.themes.push(request.theme);

    let ticket = Json(JobTicket {
        job_id,
        status: Some("pending".to_owned()),
    });
    if headers.contains_key(header::COOKIE) {
        ticket.into_response()
    } else {
        let cookie = format!("session_id={}; HttpOnly; Path=/", Uuid::new_v4());
        ([(header::SET_COOKIE, cookie)], ticket).into_response()
    }
}

async fn job_status(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Path(job_id): Path<String>,
) -> Response {
    let mut inner = state.lock().unwrap();
    inner.job_polls += 1;
    let has_session = headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.contains("session_id="));
    if has_session {
        inner.polls_with_session += 1;
    }

    let Some(script) = inner.jobs.get_mut(&job_id) else {
        return not_found("Job not found");
    };
    let response = if script.len() > 1 {
        script.pop_front()
    } else {
        script.front().cloned()
    };
    Json(response.unwrap_or_else(fixtures::processing)).into_response()
}

async fn complete_story(
    State(state): State<SharedState>,
    Path(story_id): Path<String>,
) -> Response {
    let inner = state.lock().unwrap();
    match inner.stories.get(&story_id) {
        Some(story) => Json(story.clone()).into_response(),
        None => not_found("Story not found"),
    }
}

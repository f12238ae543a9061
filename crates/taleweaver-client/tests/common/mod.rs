//! Shared test helpers for gateway integration tests.
#![allow(dead_code)]

use taleweaver_client::{DEFAULT_REQUEST_TIMEOUT, HttpStoryGateway};
use taleweaver_core::wire::JobStatusResponse;
use taleweaver_test_support::{FakeBackend, fixtures};

/// Start a backend whose jobs report `script` and which serves the cave and
/// winning stories.
pub async fn start_backend(script: Vec<JobStatusResponse>) -> FakeBackend {
    FakeBackend::start(
        script,
        vec![fixtures::cave_story(), fixtures::winning_story()],
    )
    .await
}

/// Build a gateway pointed at `backend`.
pub fn gateway_for(backend: &FakeBackend) -> HttpStoryGateway {
    HttpStoryGateway::new(backend.base_url(), DEFAULT_REQUEST_TIMEOUT).unwrap()
}

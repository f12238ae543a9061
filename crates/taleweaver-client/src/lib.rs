//! HTTP gateway to the Taleweaver story generation backend.
//!
//! Implements [`taleweaver_core::gateway::StoryGateway`] over the backend's
//! JSON API using [`reqwest`].

pub mod http;

pub use http::{DEFAULT_REQUEST_TIMEOUT, HttpStoryGateway};

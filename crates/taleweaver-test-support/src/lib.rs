//! Shared test mocks and utilities for the Taleweaver story client.

mod backend;
pub mod fixtures;
mod gateway;

pub use backend::FakeBackend;
pub use gateway::{FailingGateway, ScriptedGateway};

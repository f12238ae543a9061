//! Domain layer for the story traversal context.

pub mod engine;
pub mod graph;

//! Application layer for the story traversal context.

pub mod loader;

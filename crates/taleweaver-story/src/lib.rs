//! Taleweaver: story graph traversal context.
//!
//! Responsible for loading a generated story, validating its node graph, and
//! walking it from the root to an ending as the player chooses options.

pub mod application;
pub mod domain;

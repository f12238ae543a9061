//! Taleweaver: story generation job polling context.
//!
//! Responsible for submitting a theme to the backend, polling the resulting
//! job until it completes or fails, and handing off the generated story id.

pub mod application;
pub mod domain;

//! Domain layer for the job polling context.

pub mod job;
pub mod state;

//! Application layer for the job polling context.

pub mod poller;

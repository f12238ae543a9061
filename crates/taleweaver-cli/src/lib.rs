//! Taleweaver terminal front end.
//!
//! Wires the job poller, the HTTP gateway and the story engine into the two
//! user flows: generating a story from a theme and playing it.

pub mod config;
pub mod error;
pub mod generate;
pub mod play;
pub mod session;
pub mod telemetry;

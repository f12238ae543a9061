//! Taleweaver Core: shared domain abstractions.
//!
//! This crate defines the identifiers, error taxonomy, backend wire types and
//! the gateway trait that the job and story contexts depend on. It contains
//! no infrastructure code.

pub mod error;
pub mod gateway;
pub mod ids;
pub mod wire;

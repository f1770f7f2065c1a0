//! Moderator application review portal.
//!
//! The `workflows::review` module owns the application state machine, the capability
//! checks that gate every transition, and the seams (repository, audit sink, notifier,
//! identity provider) the HTTP service plugs its adapters into.

pub mod config;
pub mod error;
pub mod telemetry;
pub mod workflows;

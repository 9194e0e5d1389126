//! Host-side controller for mask propagation workers.
//!
//! This crate provides:
//! - Building a job descriptor from the user's selection
//! - Launching the worker with the descriptor as its last argument
//! - Decoding the worker's combined output into ordered status events
//! - Cancellation, an optional timeout, and exit code interpretation
//! - Cleanup of the per-job scratch directory on every terminal state

pub mod config;
pub mod controller;
pub mod error;
pub mod launcher;
pub mod request;
pub mod stream;

pub use config::ControllerConfig;
pub use controller::{CompletionReport, JobHandle, JobOutcome, WorkerController};
pub use error::{ControllerError, ControllerResult};
pub use launcher::WorkerLauncher;
pub use request::SelectionRequest;
pub use stream::StreamSummary;

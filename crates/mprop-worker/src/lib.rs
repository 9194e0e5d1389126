//! Mask propagation worker.
//!
//! This crate provides:
//! - The job pipeline: reorder, materialize, propagate, write masks
//! - Status line reporting on stdout
//! - Worker configuration and job-scoped logging

pub mod config;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod reporter;

pub use config::WorkerConfig;
pub use error::{WorkerError, WorkerResult};
pub use logging::JobLogger;
pub use pipeline::{run_job, run_job_with_encoder};
pub use reporter::StatusReporter;

//! Controller error types.

use thiserror::Error;

use mprop_models::{DescriptorError, JobState};

/// Result type for controller operations.
pub type ControllerResult<T> = Result<T, ControllerError>;

/// Errors raised by the controller.
///
/// Descriptor and exclusivity errors are returned by `start` before any process
/// is spawned. The rest end a running job and arrive as its single outcome.
#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("Invalid job: {0}")]
    Descriptor(#[from] DescriptorError),

    #[error("Another job is already running")]
    JobAlreadyRunning,

    #[error("Failed to launch worker: {0}")]
    WorkerLaunchFailure(String),

    #[error("Worker crashed (exit code {}): {detail}", display_code(*code))]
    WorkerCrashed { code: Option<i32>, detail: String },

    #[error("Worker exited successfully without reporting an output path")]
    IncompleteResult,

    #[error("Worker timed out after {0} seconds")]
    Timeout(u64),

    #[error("Job is {0}, not running")]
    NotRunning(JobState),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ControllerError {
    pub fn launch_failed(message: impl Into<String>) -> Self {
        Self::WorkerLaunchFailure(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Short machine-readable kind, used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ControllerError::Descriptor(_) => "invalid_descriptor",
            ControllerError::JobAlreadyRunning => "job_already_running",
            ControllerError::WorkerLaunchFailure(_) => "worker_launch_failure",
            ControllerError::WorkerCrashed { .. } => "worker_crashed",
            ControllerError::IncompleteResult => "incomplete_result",
            ControllerError::Timeout(_) => "timeout",
            ControllerError::NotRunning(_) => "not_running",
            ControllerError::Io(_) => "io",
            ControllerError::Internal(_) => "internal",
        }
    }
}

fn display_code(code: Option<i32>) -> String {
    code.map_or_else(|| "none".to_string(), |c| c.to_string())
}

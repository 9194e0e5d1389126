//! Worker error types.

use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("No parameters provided")]
    MissingDescriptor,

    #[error("Job failed: {0}")]
    JobFailed(String),

    #[error("Invalid job descriptor: {0}")]
    Descriptor(#[from] mprop_models::DescriptorError),

    #[error("Media error: {0}")]
    Media(#[from] mprop_media::MediaError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn job_failed(msg: impl Into<String>) -> Self {
        Self::JobFailed(msg.into())
    }
}

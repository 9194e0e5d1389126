//! Error types for worker-side media operations.

use std::path::PathBuf;
use thiserror::Error;

use mprop_models::{DescriptorError, OutputEncoding};

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur while preparing frames or writing masks.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("Reference frame {reference} is outside the frame range [{min}, {max}]")]
    InvalidReferenceFrame { reference: u32, min: u32, max: u32 },

    #[error("Source frame {frame} not found: {}", path.display())]
    SourceFrameMissing { frame: u32, path: PathBuf },

    #[error("Failed to materialize {}: {message}", path.display())]
    MaterializationFailure { path: PathBuf, message: String },

    #[error(
        "Failed to write {} with any encoding (tried {})",
        path.display(),
        format_encodings(tried)
    )]
    EncodingFailure {
        path: PathBuf,
        tried: Vec<OutputEncoding>,
        message: String,
    },

    #[error("Failed to read frame {}: {message}", path.display())]
    FrameRead { path: PathBuf, message: String },

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Propagation failed: {0}")]
    Propagation(String),

    #[error("Invalid job descriptor: {0}")]
    Descriptor(#[from] DescriptorError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl MediaError {
    /// Create a materialization failure error.
    pub fn materialization_failed(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::MaterializationFailure {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a frame read error.
    pub fn frame_read(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        Self::FrameRead {
            path: path.into(),
            message: message.to_string(),
        }
    }

    /// Create a propagation failure error.
    pub fn propagation(message: impl Into<String>) -> Self {
        Self::Propagation(message.into())
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}

fn format_encodings(encodings: &[OutputEncoding]) -> String {
    encodings
        .iter()
        .map(OutputEncoding::extension)
        .collect::<Vec<_>>()
        .join(", ")
}

//! Validation errors for job descriptors.

use thiserror::Error;

/// Result type for descriptor construction and validation.
pub type DescriptorResult<T> = Result<T, DescriptorError>;

/// Errors raised while building, validating or decoding a job descriptor.
///
/// Every variant is detected before a worker process is spawned.
#[derive(Debug, Error)]
pub enum DescriptorError {
    #[error("Reference frame {reference} is outside the frame range [{min}, {max}]")]
    InvalidReferenceFrame { reference: u32, min: u32, max: u32 },

    #[error("Invalid frame range: min {min} is greater than max {max}")]
    InvalidFrameRange { min: u32, max: u32 },

    #[error("Seed region must have a non-zero width and height")]
    EmptySeedRegion,

    #[error("Invalid path template: {0}")]
    InvalidTemplate(String),

    #[error("Unsupported source: {0}")]
    UnsupportedSource(String),

    #[error("Invalid frame rate: {0}")]
    InvalidFrameRate(f64),

    #[error("Unknown model: {0}")]
    UnknownModel(String),

    #[error("Unknown bit depth: {0}")]
    UnknownBitDepth(String),

    #[error("Unknown output encoding: {0}")]
    UnknownEncoding(String),

    #[error("Malformed descriptor: {0}")]
    Malformed(#[from] serde_json::Error),
}

impl DescriptorError {
    pub fn invalid_template(msg: impl Into<String>) -> Self {
        Self::InvalidTemplate(msg.into())
    }

    pub fn unsupported_source(msg: impl Into<String>) -> Self {
        Self::UnsupportedSource(msg.into())
    }
}

//! Shared data models for mask propagation jobs.
//!
//! This crate provides Serde-serializable types for:
//! - The job descriptor handed from controller to worker
//! - Frame ranges and numbered sequence templates
//! - Seed regions, model selection, bit depth and output encodings
//! - The line-oriented worker status protocol

pub mod encoding;
pub mod error;
pub mod frame;
pub mod job;
pub mod model;
pub mod rect;
pub mod status;

// Re-export common types
pub use encoding::{BitDepth, OutputEncoding};
pub use error::{DescriptorError, DescriptorResult};
pub use frame::{FrameRange, FrameTemplate};
pub use job::{JobDescriptor, JobId, JobState};
pub use model::ModelSize;
pub use rect::SeedRegion;
pub use status::WorkerEvent;

//! Worker-side media machinery for mask propagation.
//!
//! This crate provides:
//! - Circular reordering of a frame range around the reference frame
//! - Materialization of the reordered sequence via links or copies
//! - Output path resolution at real frame numbers with encoding fallback
//! - Mask rendering and the propagation capability trait

pub mod error;
pub mod frame_window;
pub mod fs_utils;
pub mod mask;
pub mod output;
pub mod progress;
pub mod propagation;
pub mod sequence;

pub use error::{MediaError, MediaResult};
pub use frame_window::FrameWindow;
pub use fs_utils::{link_or_copy, EntryKind};
pub use mask::{render_masks, FrameMasks, ObjectMask, MASK_PALETTE};
pub use output::{
    output_template, resolve_output_path, FallbackNotice, FallbackWriter, FrameEncoder,
    ImageEncoder, WrittenFrame,
};
pub use progress::PropagationProgress;
pub use propagation::{PropagationInput, Propagator, SeedBoxPropagator};
pub use sequence::{materialize, MaterializeOptions, MaterializeStats, MaterializedSequence};

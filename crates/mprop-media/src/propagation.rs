//! Mask propagation capability.
//!
//! A propagator is initialized over a materialized sequence (index 0 is the
//! reference frame) with the seed box, then yields masks lazily, front to back.
//! Backends may subsample by [`PropagationInput::stride`]; each yielded
//! [`FrameMasks`] carries the propagation index it belongs to.

use image::ColorType;
use mprop_models::{BitDepth, FrameTemplate, SeedRegion};
use tracing::{debug, warn};

use crate::error::{MediaError, MediaResult};
use crate::mask::{FrameMasks, ObjectMask};
use crate::sequence::MaterializedSequence;

/// Everything a propagator needs to initialize.
#[derive(Debug, Clone)]
pub struct PropagationInput {
    /// Frames addressed by propagation index
    pub frames: FrameTemplate,
    /// Number of frames
    pub count: usize,
    /// Seed box on index 0
    pub seed: SeedRegion,
    /// Sampling stride between processed frames
    pub stride: u32,
    /// Bit depth of the source samples
    pub bit_depth: BitDepth,
}

impl PropagationInput {
    pub fn new(sequence: &MaterializedSequence, count: usize, seed: SeedRegion) -> Self {
        Self {
            frames: sequence.template().clone(),
            count,
            seed,
            stride: 1,
            bit_depth: BitDepth::default(),
        }
    }

    pub fn with_stride(mut self, stride: u32) -> Self {
        self.stride = stride.max(1);
        self
    }

    pub fn with_bit_depth(mut self, bit_depth: BitDepth) -> Self {
        self.bit_depth = bit_depth;
        self
    }
}

/// A stateful video object segmentation backend.
pub trait Propagator {
    /// State built by [`Propagator::initialize`] and consumed by [`Propagator::propagate`]
    type State;
    /// Lazy, finite, forward-only mask stream
    type Masks: Iterator<Item = MediaResult<FrameMasks>>;

    /// Load frames and register the seed box on index 0.
    fn initialize(&mut self, input: &PropagationInput) -> MediaResult<Self::State>;

    /// Propagate the seed through the sequence.
    fn propagate(&mut self, state: Self::State) -> Self::Masks;
}

/// Deterministic propagator that reports the seed box as the mask of every frame.
///
/// Used when no segmentation backend is linked in. Only frames on the sampling
/// stride are read and checked; the frames between them reuse the last
/// sampled geometry.
#[derive(Debug, Clone, Copy, Default)]
pub struct SeedBoxPropagator;

/// State of [`SeedBoxPropagator`].
#[derive(Debug, Clone)]
pub struct SeedBoxState {
    frames: FrameTemplate,
    count: usize,
    stride: usize,
    width: u32,
    height: u32,
    region: SeedRegion,
}

impl Propagator for SeedBoxPropagator {
    type State = SeedBoxState;
    type Masks = SeedBoxMasks;

    fn initialize(&mut self, input: &PropagationInput) -> MediaResult<SeedBoxState> {
        if input.count == 0 {
            return Err(MediaError::propagation("no frames to propagate over"));
        }

        let reference = input.frames.frame_path(0);
        let decoded = image::open(&reference).map_err(|e| MediaError::frame_read(&reference, e))?;
        let (width, height) = (decoded.width(), decoded.height());
        if let Some(bits) = depth_mismatch(input.bit_depth, decoded.color()) {
            warn!(
                "Reference frame has {}-bit samples but the source was declared {}",
                bits, input.bit_depth
            );
        }

        let region = input.seed.clamp_to(width, height).ok_or_else(|| {
            MediaError::propagation(format!(
                "seed region {:?} lies outside the {}x{} reference frame",
                input.seed, width, height
            ))
        })?;

        debug!(
            width,
            height,
            stride = input.stride,
            ?region,
            "Seed box registered on index 0"
        );

        Ok(SeedBoxState {
            frames: input.frames.clone(),
            count: input.count,
            stride: input.stride.max(1) as usize,
            width,
            height,
            region,
        })
    }

    fn propagate(&mut self, state: SeedBoxState) -> SeedBoxMasks {
        SeedBoxMasks { state, next: 0 }
    }
}

/// Mask stream of [`SeedBoxPropagator`].
#[derive(Debug)]
pub struct SeedBoxMasks {
    state: SeedBoxState,
    next: usize,
}

impl SeedBoxMasks {
    fn check_frame(&self, index: usize) -> MediaResult<()> {
        let path = self.state.frames.frame_path(index as u32);
        let (width, height) =
            image::image_dimensions(&path).map_err(|e| MediaError::frame_read(&path, e))?;
        if (width, height) != (self.state.width, self.state.height) {
            return Err(MediaError::frame_read(
                &path,
                format!(
                    "frame is {}x{}, expected {}x{}",
                    width, height, self.state.width, self.state.height
                ),
            ));
        }
        Ok(())
    }
}

/// Bits per sample of `color` when they contradict a declared fixed-point depth.
///
/// Float sources are not checked, decoders widen half floats.
fn depth_mismatch(declared: BitDepth, color: ColorType) -> Option<u16> {
    if declared.float {
        return None;
    }
    let bits = color.bits_per_pixel() / u16::from(color.channel_count());
    (bits != u16::from(declared.bits)).then_some(bits)
}

impl Iterator for SeedBoxMasks {
    type Item = MediaResult<FrameMasks>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.state.count {
            return None;
        }
        let index = self.next;
        self.next += 1;

        if index % self.state.stride == 0 {
            if let Err(e) = self.check_frame(index) {
                // Stop after the first unreadable frame.
                self.next = self.state.count;
                return Some(Err(e));
            }
        }

        let (width, height) = (self.state.width, self.state.height);
        Some(Ok(FrameMasks {
            index,
            width,
            height,
            objects: vec![ObjectMask::from_region(0, width, height, self.state.region)],
        }))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.state.count - self.next;
        (0, Some(remaining))
    }
}

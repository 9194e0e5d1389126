//! Job descriptor handed from the controller to the worker.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use uuid::Uuid;

use crate::encoding::{BitDepth, OutputEncoding};
use crate::error::{DescriptorError, DescriptorResult};
use crate::frame::{FrameRange, FrameTemplate};
use crate::model::ModelSize;
use crate::rect::SeedRegion;

/// Frame rate assumed when the requested target rate is not positive.
pub const DEFAULT_TARGET_FPS: f64 = 24.0;

/// Unique identifier for a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle of a job as seen by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// No worker has been launched yet
    #[default]
    Idle,
    /// Worker process is being spawned
    Launching,
    /// Worker is running and reporting status
    Running,
    /// Worker exited successfully and reported an output path
    Completed,
    /// Worker was killed on request
    Cancelled,
    /// Worker could not be launched, crashed, timed out or returned no result
    Failed,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Idle => "idle",
            JobState::Launching => "launching",
            JobState::Running => "running",
            JobState::Completed => "completed",
            JobState::Cancelled => "cancelled",
            JobState::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobState::Completed | JobState::Cancelled | JobState::Failed
        )
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Everything the worker needs to run one propagation job.
///
/// Built once by the controller, serialized as a single JSON argument and never
/// mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct JobDescriptor {
    /// Unique job ID
    #[serde(default)]
    pub job_id: JobId,

    /// Source sequence template, e.g. `/plates/shot.%04d.png`
    #[schemars(with = "String")]
    pub source: FrameTemplate,

    /// Output mask template, e.g. `/masks/shot_mask.%04d.png`
    #[schemars(with = "String")]
    pub output: FrameTemplate,

    /// Preferred per-frame encoding for the masks
    #[serde(default)]
    pub output_encoding: OutputEncoding,

    /// Seed box on the reference frame
    pub seed: SeedRegion,

    /// Inclusive frame range to process
    pub frame_range: FrameRange,

    /// Frame the seed box was drawn on
    pub reference_frame: u32,

    /// Requested sampling rate
    #[serde(default = "default_target_fps")]
    pub target_fps: f64,

    /// Native rate of the source
    #[serde(default = "default_target_fps")]
    pub original_fps: f64,

    /// Source bit depth, e.g. `"16-bit half float"`
    #[serde(default)]
    #[schemars(with = "String")]
    pub bit_depth: BitDepth,

    /// Model size
    #[serde(default)]
    pub model: ModelSize,

    /// Repository holding model checkpoints and configs
    pub model_repo: PathBuf,

    /// Controller-owned directory for the worker's temporary files
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scratch_root: Option<PathBuf>,
}

fn default_target_fps() -> f64 {
    DEFAULT_TARGET_FPS
}

impl JobDescriptor {
    /// Create a descriptor with default rates, bit depth, model and encoding.
    pub fn new(
        source: FrameTemplate,
        output: FrameTemplate,
        seed: SeedRegion,
        frame_range: FrameRange,
        reference_frame: u32,
        model_repo: impl Into<PathBuf>,
    ) -> Self {
        let output_encoding = output
            .extension()
            .and_then(|ext| OutputEncoding::from_extension(&ext))
            .unwrap_or_default();

        Self {
            job_id: JobId::new(),
            source,
            output,
            output_encoding,
            seed,
            frame_range,
            reference_frame,
            target_fps: DEFAULT_TARGET_FPS,
            original_fps: DEFAULT_TARGET_FPS,
            bit_depth: BitDepth::default(),
            model: ModelSize::default(),
            model_repo: model_repo.into(),
            scratch_root: None,
        }
    }

    pub fn with_rates(mut self, target_fps: f64, original_fps: f64) -> Self {
        self.target_fps = target_fps;
        self.original_fps = original_fps;
        self
    }

    pub fn with_bit_depth(mut self, bit_depth: BitDepth) -> Self {
        self.bit_depth = bit_depth;
        self
    }

    pub fn with_model(mut self, model: ModelSize) -> Self {
        self.model = model;
        self
    }

    pub fn with_output_encoding(mut self, encoding: OutputEncoding) -> Self {
        self.output_encoding = encoding;
        self
    }

    pub fn with_scratch_root(mut self, scratch_root: impl Into<PathBuf>) -> Self {
        self.scratch_root = Some(scratch_root.into());
        self
    }

    /// Check the descriptor invariants.
    pub fn validate(&self) -> DescriptorResult<()> {
        let range = FrameRange::new(self.frame_range.min, self.frame_range.max)?;

        if !range.contains(self.reference_frame) {
            return Err(DescriptorError::InvalidReferenceFrame {
                reference: self.reference_frame,
                min: range.min,
                max: range.max,
            });
        }

        if !self.seed.is_valid() {
            return Err(DescriptorError::EmptySeedRegion);
        }

        if !self.original_fps.is_finite() || self.original_fps <= 0.0 {
            return Err(DescriptorError::InvalidFrameRate(self.original_fps));
        }
        if self.target_fps.is_nan() {
            return Err(DescriptorError::InvalidFrameRate(self.target_fps));
        }

        if self.source.is_movie_container() {
            return Err(DescriptorError::unsupported_source(format!(
                "'{}' is a movie container, convert it to an image sequence first",
                self.source
            )));
        }

        if self.output.is_movie_container() {
            return Err(DescriptorError::invalid_template(format!(
                "'{}' is not an image sequence",
                self.output
            )));
        }

        if self.output.file_stem().is_empty() {
            return Err(DescriptorError::invalid_template("output file name is empty"));
        }

        Ok(())
    }

    /// Stride between sampled source frames.
    pub fn sampling_stride(&self) -> u32 {
        let target = if self.target_fps > 0.0 {
            self.target_fps
        } else {
            DEFAULT_TARGET_FPS
        };
        let stride = (self.original_fps / target).round();
        if stride.is_finite() && stride >= 1.0 {
            stride as u32
        } else {
            1
        }
    }

    /// Serialize to the single-argument wire form.
    pub fn to_json(&self) -> DescriptorResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode and validate a descriptor received on the command line.
    pub fn from_json(json: &str) -> DescriptorResult<Self> {
        let descriptor: Self = serde_json::from_str(json)?;
        descriptor.validate()?;
        Ok(descriptor)
    }

    /// JSON schema of the wire form.
    pub fn json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(JobDescriptor)
    }
}

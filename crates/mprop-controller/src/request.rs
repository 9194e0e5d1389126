//! Host selection state turned into a job descriptor.

use std::path::PathBuf;

use mprop_models::{
    BitDepth, DescriptorError, DescriptorResult, FrameRange, FrameTemplate, JobDescriptor,
    ModelSize, OutputEncoding, SeedRegion,
};

/// Everything the user selected for one job.
///
/// An immutable snapshot taken when the user starts tracking; the descriptor
/// built from it is never affected by later edits.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionRequest {
    pub source: String,
    pub output: String,
    pub seed: SeedRegion,
    pub frame_min: u32,
    pub frame_max: u32,
    pub reference_frame: u32,
    pub target_fps: f64,
    pub original_fps: f64,
    /// Bit depth from the host's reader metadata, e.g. `"16-bit half float"`
    pub bit_depth: Option<String>,
    pub model: ModelSize,
    /// Overrides the encoding implied by the output extension
    pub output_encoding: Option<OutputEncoding>,
}

impl SelectionRequest {
    /// Build and validate the descriptor.
    ///
    /// Beyond the descriptor invariants this requires a frame placeholder in
    /// the output template, since masks are always written as a sequence, and
    /// an output extension naming a supported encoding unless one is given.
    pub fn into_descriptor(
        self,
        model_repo: impl Into<PathBuf>,
    ) -> DescriptorResult<JobDescriptor> {
        let source = FrameTemplate::parse(self.source)?;
        let output = FrameTemplate::parse(self.output)?;
        let range = FrameRange::new(self.frame_min, self.frame_max)?;

        if output.file_stem().is_empty() {
            return Err(DescriptorError::invalid_template("output file name is empty"));
        }
        if !output.is_sequence() {
            return Err(DescriptorError::invalid_template(format!(
                "output '{}' must contain '####' or '###' (or %04d / %03d)",
                output
            )));
        }

        let bit_depth = match self.bit_depth.as_deref() {
            Some(text) => text.parse()?,
            None => source
                .extension()
                .and_then(|ext| BitDepth::infer_from_extension(&ext))
                .unwrap_or_default(),
        };

        let output_encoding = match self.output_encoding {
            Some(encoding) => encoding,
            None => {
                let ext = output.extension().unwrap_or_default();
                OutputEncoding::from_extension(&ext).ok_or_else(|| {
                    DescriptorError::UnknownEncoding(format!(
                        "'{}' in output '{}' (expected png, exr or tiff)",
                        ext, output
                    ))
                })?
            }
        };

        let descriptor =
            JobDescriptor::new(source, output, self.seed, range, self.reference_frame, model_repo)
                .with_rates(self.target_fps, self.original_fps)
                .with_bit_depth(bit_depth)
                .with_model(self.model)
                .with_output_encoding(output_encoding);

        descriptor.validate()?;
        Ok(descriptor)
    }
}

//! Output path resolution and mask writing with encoding fallback.

use image::{DynamicImage, ImageFormat, RgbImage};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use mprop_models::{FrameTemplate, OutputEncoding};

use crate::error::{MediaError, MediaResult};

/// Path of the mask for `real_frame` written with `encoding`.
///
/// A template without a placeholder gets `_<frame:04>` appended to its stem.
pub fn resolve_output_path(
    template: &FrameTemplate,
    real_frame: u32,
    encoding: OutputEncoding,
) -> PathBuf {
    if template.is_sequence() {
        return template
            .with_extension(encoding.extension())
            .frame_path(real_frame);
    }
    let name = format!(
        "{}_{:04}.{}",
        template.file_stem(),
        real_frame,
        encoding.extension()
    );
    match template.parent() {
        Some(parent) => parent.join(name),
        None => PathBuf::from(name),
    }
}

/// Sequence template of the masks written with `encoding`.
pub fn output_template(
    template: &FrameTemplate,
    encoding: OutputEncoding,
) -> MediaResult<FrameTemplate> {
    if template.is_sequence() {
        return Ok(template.with_extension(encoding.extension()));
    }
    let name = format!("{}_%04d.{}", template.file_stem(), encoding.extension());
    let path = match template.parent() {
        Some(parent) => parent.join(name),
        None => PathBuf::from(name),
    };
    Ok(FrameTemplate::parse(path.to_string_lossy().into_owned())?)
}

/// Writes one rendered mask to disk in a given encoding.
pub trait FrameEncoder {
    fn encode(&self, image: &RgbImage, path: &Path, encoding: OutputEncoding) -> MediaResult<()>;
}

/// Encoder backed by the `image` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageEncoder;

impl FrameEncoder for ImageEncoder {
    fn encode(&self, image: &RgbImage, path: &Path, encoding: OutputEncoding) -> MediaResult<()> {
        match encoding {
            OutputEncoding::Png => image.save_with_format(path, ImageFormat::Png)?,
            OutputEncoding::Tiff => image.save_with_format(path, ImageFormat::Tiff)?,
            OutputEncoding::Exr => {
                let float = DynamicImage::ImageRgb8(image.clone()).to_rgb32f();
                float.save_with_format(path, ImageFormat::OpenExr)?
            }
        }
        Ok(())
    }
}

/// Reported once per job, on the first frame written with a fallback encoding.
#[derive(Debug, Clone, PartialEq)]
pub struct FallbackNotice {
    pub from: OutputEncoding,
    pub to: OutputEncoding,
    pub reason: String,
}

/// Result of writing one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct WrittenFrame {
    pub path: PathBuf,
    pub encoding: OutputEncoding,
    /// Set only on the first fallback of the job
    pub fallback: Option<FallbackNotice>,
}

/// Writes masks at their real frame numbers, degrading along a fallback chain.
///
/// Once an encoding succeeds it is kept for the rest of the job, so later frames
/// do not retry encodings that already failed.
pub struct FallbackWriter<E = ImageEncoder> {
    template: FrameTemplate,
    preferred: OutputEncoding,
    chain: Vec<OutputEncoding>,
    confirmed: Option<OutputEncoding>,
    notified: bool,
    encoder: E,
}

impl FallbackWriter<ImageEncoder> {
    pub fn new(
        template: FrameTemplate,
        preferred: OutputEncoding,
        chain: Vec<OutputEncoding>,
    ) -> Self {
        Self::with_encoder(template, preferred, chain, ImageEncoder)
    }
}

impl<E: FrameEncoder> FallbackWriter<E> {
    pub fn with_encoder(
        template: FrameTemplate,
        preferred: OutputEncoding,
        chain: Vec<OutputEncoding>,
        encoder: E,
    ) -> Self {
        Self {
            template,
            preferred,
            chain,
            confirmed: None,
            notified: false,
            encoder,
        }
    }

    /// Encoding used for the next frame.
    pub fn active_encoding(&self) -> OutputEncoding {
        self.confirmed.unwrap_or(self.preferred)
    }

    /// Template of the frames written so far.
    pub fn resolved_template(&self) -> MediaResult<FrameTemplate> {
        output_template(&self.template, self.active_encoding())
    }

    /// Create the output directory if it does not exist.
    pub fn prepare(&self) -> MediaResult<()> {
        if let Some(parent) = self.template.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(&parent)?;
            }
        }
        Ok(())
    }

    /// Write `image` as the mask of `real_frame`.
    ///
    /// # Errors
    ///
    /// [`MediaError::EncodingFailure`] when every encoding in the chain fails.
    pub fn write(&mut self, image: &RgbImage, real_frame: u32) -> MediaResult<WrittenFrame> {
        let mut tried = Vec::new();
        let mut first_error: Option<String> = None;

        for encoding in self.candidates() {
            let path = resolve_output_path(&self.template, real_frame, encoding);
            tried.push(encoding);

            match self.encoder.encode(image, &path, encoding) {
                Ok(()) => {
                    self.confirmed = Some(encoding);
                    let fallback = if encoding != self.preferred && !self.notified {
                        self.notified = true;
                        let notice = FallbackNotice {
                            from: self.preferred,
                            to: encoding,
                            reason: first_error.unwrap_or_default(),
                        };
                        warn!(
                            "Cannot write {} output ({}), falling back to {}",
                            notice.from, notice.reason, notice.to
                        );
                        Some(notice)
                    } else {
                        None
                    };
                    debug!("Wrote mask for frame {} to {}", real_frame, path.display());
                    return Ok(WrittenFrame {
                        path,
                        encoding,
                        fallback,
                    });
                }
                Err(e) => {
                    debug!("Encoding {} failed for {}: {}", encoding, path.display(), e);
                    let _ = std::fs::remove_file(&path);
                    if first_error.is_none() {
                        first_error = Some(e.to_string());
                    }
                }
            }
        }

        Err(MediaError::EncodingFailure {
            path: resolve_output_path(&self.template, real_frame, self.preferred),
            tried,
            message: first_error.unwrap_or_else(|| "no encodings available".to_string()),
        })
    }

    /// Encodings to try, in order, without repeats.
    fn candidates(&self) -> Vec<OutputEncoding> {
        let mut out = vec![self.active_encoding()];
        for &encoding in &self.chain {
            // The preferred encoding is not retried once a fallback is confirmed.
            if self.confirmed.is_some() && encoding == self.preferred {
                continue;
            }
            if !out.contains(&encoding) {
                out.push(encoding);
            }
        }
        out
    }
}

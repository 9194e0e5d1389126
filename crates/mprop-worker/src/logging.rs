//! Job-scoped logging for the worker.
//!
//! Everything logged here goes to stderr; stdout is reserved for the status
//! protocol. The controller relays these lines as diagnostics.

use tracing::{debug, error, info, warn, Span};

use mprop_media::{FallbackNotice, MaterializeStats, PropagationProgress};
use mprop_models::{FrameRange, FrameTemplate, JobDescriptor, JobId};

use crate::config::WorkerConfig;
use crate::error::WorkerError;

/// Logs the lifecycle of one mask job with its frame range and reference frame
/// attached to every event.
#[derive(Debug, Clone)]
pub struct JobLogger {
    job_id: JobId,
    frame_range: FrameRange,
    reference_frame: u32,
}

impl JobLogger {
    pub fn new(descriptor: &JobDescriptor) -> Self {
        Self {
            job_id: descriptor.job_id.clone(),
            frame_range: descriptor.frame_range,
            reference_frame: descriptor.reference_frame,
        }
    }

    /// Span covering the whole job.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "mask_job",
            job_id = %self.job_id,
            frames = %self.frame_range,
            reference = self.reference_frame
        )
    }

    pub fn log_start(&self, descriptor: &JobDescriptor, config: &WorkerConfig) {
        info!(
            job_id = %self.job_id,
            model = %descriptor.model,
            bit_depth = %descriptor.bit_depth,
            stride = descriptor.sampling_stride(),
            prefer_links = config.prefer_links,
            "Mask job started: {} -> {} ({} frames from {})",
            descriptor.source,
            descriptor.output,
            self.frame_range.count(),
            self.reference_frame
        );
    }

    pub fn log_materialized(&self, stats: MaterializeStats) {
        info!(
            job_id = %self.job_id,
            links = stats.links,
            copies = stats.copies,
            "Sequence materialized ({} entries)",
            stats.total()
        );
        if stats.copies > 0 && stats.links == 0 {
            warn!(
                job_id = %self.job_id,
                "Frame links unavailable, every frame was copied"
            );
        }
    }

    pub fn log_frame(&self, progress: &PropagationProgress) {
        debug!(
            job_id = %self.job_id,
            index = progress.index,
            frame = progress.frame,
            "Mask ready"
        );
    }

    /// Log a fallback and return the text relayed to the user.
    pub fn log_fallback(&self, notice: &FallbackNotice) -> String {
        let message = fallback_message(notice);
        warn!(
            job_id = %self.job_id,
            from = %notice.from,
            to = %notice.to,
            "{}",
            message
        );
        message
    }

    pub fn log_completion(&self, template: &FrameTemplate, written: usize) {
        info!(
            job_id = %self.job_id,
            written,
            "Mask job completed: {} of {} frames written to {}",
            written,
            self.frame_range.count(),
            template
        );
    }

    pub fn log_failure(&self, err: &WorkerError) {
        error!(job_id = %self.job_id, "Mask job failed: {}", err);
    }

    pub fn log_release_failure(&self, err: &mprop_media::MediaError) {
        warn!(
            job_id = %self.job_id,
            "Failed to remove materialized sequence: {}",
            err
        );
    }
}

/// User-facing text of a fallback notice.
pub fn fallback_message(notice: &FallbackNotice) -> String {
    format!(
        "{} output failed ({}), writing {} instead",
        notice.from.extension().to_uppercase(),
        notice.reason,
        notice.to.extension().to_uppercase()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use mprop_models::OutputEncoding;

    #[test]
    fn test_fallback_message() {
        let notice = FallbackNotice {
            from: OutputEncoding::Exr,
            to: OutputEncoding::Png,
            reason: "no EXR writer".to_string(),
        };
        assert_eq!(
            fallback_message(&notice),
            "EXR output failed (no EXR writer), writing PNG instead"
        );
    }

    #[test]
    fn test_logger_carries_job_fields() {
        let descriptor = JobDescriptor::new(
            FrameTemplate::parse("/plates/a.%04d.png").unwrap(),
            FrameTemplate::parse("/masks/a.%04d.png").unwrap(),
            mprop_models::SeedRegion::new(0, 0, 4, 4),
            FrameRange::new(1001, 1200).unwrap(),
            1112,
            "/repo",
        );
        let logger = JobLogger::new(&descriptor);

        assert_eq!(logger.job_id, descriptor.job_id);
        assert_eq!(logger.frame_range, FrameRange { min: 1001, max: 1200 });
        assert_eq!(logger.reference_frame, 1112);
    }
}

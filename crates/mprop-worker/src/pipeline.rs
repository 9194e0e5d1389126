//! The mask propagation job.

use std::io::Write;
use tracing::debug;

use mprop_media::{
    materialize, FallbackWriter, FrameEncoder, FrameWindow, ImageEncoder, MaterializeOptions,
    MaterializedSequence, PropagationInput, PropagationProgress, Propagator,
};
use mprop_models::{FrameTemplate, JobDescriptor};

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::logging::JobLogger;
use crate::reporter::StatusReporter;

/// Run one job, reporting on `reporter`.
///
/// Returns the output template actually written, after any encoding fallback.
/// The materialized sequence is removed before returning, whatever the outcome.
pub fn run_job<P, W>(
    descriptor: &JobDescriptor,
    config: &WorkerConfig,
    propagator: &mut P,
    reporter: &mut StatusReporter<W>,
) -> WorkerResult<FrameTemplate>
where
    P: Propagator,
    W: Write,
{
    run_job_with_encoder(descriptor, config, propagator, ImageEncoder, reporter)
}

/// [`run_job`] writing masks through `encoder`.
pub fn run_job_with_encoder<P, E, W>(
    descriptor: &JobDescriptor,
    config: &WorkerConfig,
    propagator: &mut P,
    encoder: E,
    reporter: &mut StatusReporter<W>,
) -> WorkerResult<FrameTemplate>
where
    P: Propagator,
    E: FrameEncoder,
    W: Write,
{
    let logger = JobLogger::new(descriptor);
    let span = logger.create_span();
    let _entered = span.enter();

    logger.log_start(descriptor, config);

    reporter.stage("Loading Model...")?;
    let checkpoint = descriptor.model.checkpoint_path(&descriptor.model_repo);
    let model_config = descriptor.model.config_path(&descriptor.model_repo);
    debug!(
        checkpoint = %checkpoint.display(),
        config = %model_config.display(),
        "Selected model {}",
        descriptor.model
    );

    reporter.stage("Initializing Video...")?;
    let window = FrameWindow::for_range(descriptor.frame_range, descriptor.reference_frame)?;
    let options = MaterializeOptions {
        prefer_links: config.prefer_links,
        scratch_root: descriptor.scratch_root.clone(),
    };
    let sequence = materialize(&descriptor.source, &window, &options)?;
    logger.log_materialized(sequence.stats());

    let writer = FallbackWriter::with_encoder(
        descriptor.output.clone(),
        descriptor.output_encoding,
        config.fallback_encodings.clone(),
        encoder,
    );
    let job = Job {
        descriptor,
        window: &window,
        sequence: &sequence,
        logger: &logger,
    };
    let result = job.propagate(propagator, writer, reporter);

    if let Err(e) = sequence.release() {
        logger.log_release_failure(&e);
    }

    if let Err(e) = &result {
        logger.log_failure(e);
    }
    result
}

struct Job<'a> {
    descriptor: &'a JobDescriptor,
    window: &'a FrameWindow,
    sequence: &'a MaterializedSequence,
    logger: &'a JobLogger,
}

impl Job<'_> {
    fn propagate<P, E, W>(
        &self,
        propagator: &mut P,
        mut writer: FallbackWriter<E>,
        reporter: &mut StatusReporter<W>,
    ) -> WorkerResult<FrameTemplate>
    where
        P: Propagator,
        E: FrameEncoder,
        W: Write,
    {
        let descriptor = self.descriptor;
        let window = self.window;

        reporter.stage("Reading Frames...")?;
        let input = PropagationInput::new(self.sequence, window.len(), descriptor.seed)
            .with_stride(descriptor.sampling_stride())
            .with_bit_depth(descriptor.bit_depth);

        reporter.stage(format!(
            "Detecting Object on Frame {}...",
            descriptor.reference_frame
        ))?;
        let state = propagator.initialize(&input)?;
        writer.prepare()?;

        reporter.stage("Propagating Masks...")?;
        reporter.progress(0)?;

        let range = window.range();
        let mut written = 0usize;
        for masks in propagator.propagate(state) {
            let masks = masks?;
            let frame = window.index_to_frame(masks.index).ok_or_else(|| {
                WorkerError::job_failed(format!(
                    "propagation yielded index {} outside a window of {} frames",
                    masks.index,
                    window.len()
                ))
            })?;

            let progress = PropagationProgress {
                index: masks.index,
                frame,
                max_frame: range.max,
                total: window.len(),
            };
            reporter.progress(progress.percent())?;
            reporter.stage(progress.stage_text())?;
            self.logger.log_frame(&progress);

            let frame_written = writer.write(&masks.render(), frame)?;
            if let Some(notice) = frame_written.fallback {
                let message = self.logger.log_fallback(&notice);
                reporter.note(message)?;
            }
            written += 1;
        }

        if written == 0 {
            return Err(WorkerError::job_failed("propagation produced no masks"));
        }

        reporter.progress(100)?;
        reporter.stage("Saving Complete!")?;

        let resolved = writer.resolved_template()?;
        self.logger.log_completion(&resolved, written);
        reporter.output_path(resolved.as_str())?;
        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;
    use mprop_media::{FrameMasks, MediaError, MediaResult, SeedBoxPropagator};
    use mprop_models::{FrameRange, OutputEncoding, SeedRegion, WorkerEvent};
    use std::path::Path;
    use tempfile::TempDir;

    fn plates(dir: &Path, min: u32, max: u32) -> FrameTemplate {
        for frame in min..=max {
            RgbImage::new(8, 6)
                .save(dir.join(format!("plate.{:04}.png", frame)))
                .unwrap();
        }
        FrameTemplate::parse(dir.join("plate.%04d.png").to_string_lossy().into_owned()).unwrap()
    }

    fn descriptor(src: &Path, out: &Path, scratch: &Path) -> JobDescriptor {
        JobDescriptor::new(
            plates(src, 11, 15),
            FrameTemplate::parse(out.join("mask.%04d.png").to_string_lossy().into_owned())
                .unwrap(),
            SeedRegion::new(1, 1, 3, 2),
            FrameRange::new(11, 15).unwrap(),
            13,
            "/opt/sam2_repo",
        )
        .with_scratch_root(scratch)
    }

    fn dirs() -> (TempDir, TempDir, TempDir) {
        (
            TempDir::new().unwrap(),
            TempDir::new().unwrap(),
            TempDir::new().unwrap(),
        )
    }

    fn run(
        d: &JobDescriptor,
        propagator: &mut impl Propagator,
        reporter: &mut StatusReporter<Vec<u8>>,
    ) -> WorkerResult<FrameTemplate> {
        run_job(d, &WorkerConfig::default(), propagator, reporter)
    }

    fn events(bytes: Vec<u8>) -> Vec<WorkerEvent> {
        String::from_utf8(bytes)
            .unwrap()
            .lines()
            .map(WorkerEvent::decode)
            .collect()
    }

    #[test]
    fn test_run_job_writes_real_frame_numbers() {
        let (src, out, scratch) = dirs();
        let d = descriptor(src.path(), out.path(), scratch.path());
        let mut reporter = StatusReporter::new(Vec::new());

        let template = run(&d, &mut SeedBoxPropagator, &mut reporter).unwrap();

        assert_eq!(template, d.output);
        for frame in 11..=15 {
            let path = out.path().join(format!("mask.{:04}.png", frame));
            let img = image::open(&path).unwrap().to_rgb8();
            assert_eq!(img.get_pixel(1, 1).0, [255, 255, 255]);
            assert_eq!(img.get_pixel(7, 5).0, [0, 0, 0]);
        }
        assert_eq!(std::fs::read_dir(scratch.path()).unwrap().count(), 0);

        let events = events(reporter.into_inner());
        let stages: Vec<&str> = events
            .iter()
            .filter_map(|e| match e {
                WorkerEvent::Stage(s) => Some(s.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(
            stages,
            vec![
                "Loading Model...",
                "Initializing Video...",
                "Reading Frames...",
                "Detecting Object on Frame 13...",
                "Propagating Masks...",
                "Frame 13/15 (0%)",
                "Frame 14/15 (20%)",
                "Frame 15/15 (40%)",
                "Frame 11/15 (60%)",
                "Frame 12/15 (80%)",
                "Saving Complete!",
            ]
        );

        let progress: Vec<u8> = events
            .iter()
            .filter_map(|e| match e {
                WorkerEvent::Progress(p) => Some(*p),
                _ => None,
            })
            .collect();
        assert_eq!(progress.first(), Some(&0));
        assert_eq!(progress.last(), Some(&100));
        assert!(progress.windows(2).all(|w| w[0] <= w[1]));

        assert_eq!(
            events.last(),
            Some(&WorkerEvent::OutputPath(d.output.as_str().into()))
        );
    }

    #[test]
    fn test_missing_frame_fails_and_cleans_up() {
        let (src, out, scratch) = dirs();
        let d = descriptor(src.path(), out.path(), scratch.path());
        std::fs::remove_file(src.path().join("plate.0012.png")).unwrap();
        let mut reporter = StatusReporter::new(Vec::new());

        let err = run(&d, &mut SeedBoxPropagator, &mut reporter).unwrap_err();

        assert!(matches!(
            err,
            WorkerError::Media(MediaError::SourceFrameMissing { frame: 12, .. })
        ));
        assert_eq!(std::fs::read_dir(scratch.path()).unwrap().count(), 0);
        assert!(!events(reporter.into_inner())
            .iter()
            .any(|e| matches!(e, WorkerEvent::OutputPath(_))));
    }

    /// Fails half way through the sequence.
    struct FailingPropagator;

    impl Propagator for FailingPropagator {
        type State = usize;
        type Masks = std::vec::IntoIter<MediaResult<FrameMasks>>;

        fn initialize(&mut self, input: &PropagationInput) -> MediaResult<usize> {
            Ok(input.count)
        }

        fn propagate(&mut self, count: usize) -> Self::Masks {
            let mut out: Vec<MediaResult<FrameMasks>> = (0..count / 2)
                .map(|index| {
                    Ok(FrameMasks {
                        index,
                        width: 2,
                        height: 2,
                        objects: vec![],
                    })
                })
                .collect();
            out.push(Err(MediaError::propagation("out of memory")));
            out.into_iter()
        }
    }

    #[test]
    fn test_propagation_failure_cleans_up() {
        let (src, out, scratch) = dirs();
        let d = descriptor(src.path(), out.path(), scratch.path());
        let mut reporter = StatusReporter::new(Vec::new());

        let err = run(&d, &mut FailingPropagator, &mut reporter).unwrap_err();

        assert!(err.to_string().contains("out of memory"));
        assert_eq!(std::fs::read_dir(scratch.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_output_without_placeholder_gets_frame_suffix() {
        let (src, out, scratch) = dirs();
        let mut d = descriptor(src.path(), out.path(), scratch.path());
        let matte = out.path().join("matte.png");
        d.output = FrameTemplate::parse(matte.to_string_lossy().into_owned()).unwrap();
        d.output_encoding = OutputEncoding::Png;
        let mut reporter = StatusReporter::new(Vec::new());

        let template = run(&d, &mut SeedBoxPropagator, &mut reporter).unwrap();

        assert!(template.as_str().ends_with("matte_%04d.png"));
        assert!(out.path().join("matte_0011.png").exists());
        assert!(out.path().join("matte_0015.png").exists());
    }

    /// Rejects EXR and writes everything else with [`ImageEncoder`].
    struct NoExrEncoder;

    impl FrameEncoder for NoExrEncoder {
        fn encode(
            &self,
            image: &RgbImage,
            path: &Path,
            encoding: OutputEncoding,
        ) -> MediaResult<()> {
            if encoding == OutputEncoding::Exr {
                return Err(MediaError::internal("EXR writer unavailable"));
            }
            ImageEncoder.encode(image, path, encoding)
        }
    }

    #[test]
    fn test_encoding_fallback_noted_once_per_job() {
        let (src, out, scratch) = dirs();
        let mut d = descriptor(src.path(), out.path(), scratch.path());
        let exr = out.path().join("mask.%04d.exr");
        d.output = FrameTemplate::parse(exr.to_string_lossy().into_owned()).unwrap();
        d.output_encoding = OutputEncoding::Exr;
        let mut reporter = StatusReporter::new(Vec::new());

        let template = run_job_with_encoder(
            &d,
            &WorkerConfig::default(),
            &mut SeedBoxPropagator,
            NoExrEncoder,
            &mut reporter,
        )
        .unwrap();

        assert!(template.as_str().ends_with("mask.%04d.png"));
        for frame in 11..=15 {
            assert!(out.path().join(format!("mask.{:04}.png", frame)).is_file());
            assert!(!out.path().join(format!("mask.{:04}.exr", frame)).exists());
        }

        let events = events(reporter.into_inner());
        let notes: Vec<&WorkerEvent> = events
            .iter()
            .filter(|e| matches!(e, WorkerEvent::Diagnostic(t) if t.ends_with("instead")))
            .collect();
        assert_eq!(
            notes,
            vec![&WorkerEvent::Diagnostic(
                "[mprop-worker] EXR output failed (Internal error: EXR writer unavailable), \
                 writing PNG instead"
                    .into()
            )]
        );
        assert_eq!(
            events.last(),
            Some(&WorkerEvent::OutputPath(template.as_str().into()))
        );
    }
}

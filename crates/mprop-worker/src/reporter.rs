//! Status line emission.

use std::io::Write;
use std::path::Path;

use mprop_models::WorkerEvent;

/// Writes protocol lines to the worker's stdout, flushing after each one so the
/// controller sees events as they happen.
pub struct StatusReporter<W: Write> {
    out: W,
}

impl<W: Write> StatusReporter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn stage(&mut self, text: impl Into<String>) -> std::io::Result<()> {
        self.emit(&WorkerEvent::Stage(text.into()))
    }

    pub fn progress(&mut self, percent: u8) -> std::io::Result<()> {
        self.emit(&WorkerEvent::Progress(percent.min(100)))
    }

    pub fn output_path(&mut self, path: impl AsRef<Path>) -> std::io::Result<()> {
        self.emit(&WorkerEvent::OutputPath(path.as_ref().to_path_buf()))
    }

    pub fn fatal(&mut self, text: impl Into<String>) -> std::io::Result<()> {
        self.emit(&WorkerEvent::Fatal(text.into()))
    }

    /// Free-form line relayed to the user as-is.
    pub fn note(&mut self, text: impl Into<String>) -> std::io::Result<()> {
        self.emit(&WorkerEvent::Diagnostic(format!("[mprop-worker] {}", text.into())))
    }

    pub fn emit(&mut self, event: &WorkerEvent) -> std::io::Result<()> {
        writeln!(self.out, "{}", event.encode())?;
        self.out.flush()
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lines() {
        let mut reporter = StatusReporter::new(Vec::new());
        reporter.stage("Loading Model...").unwrap();
        reporter.progress(150).unwrap();
        reporter.note("EXR unavailable").unwrap();
        reporter.output_path("/out/m.%04d.png").unwrap();
        reporter.fatal("bad\nthing").unwrap();

        let text = String::from_utf8(reporter.into_inner()).unwrap();
        assert_eq!(
            text,
            "STAGE:Loading Model...\n\
             PROGRESS:100\n\
             [mprop-worker] EXR unavailable\n\
             OUTPUT_PATH:/out/m.%04d.png\n\
             ERROR:bad thing\n"
        );
    }
}

//! Decoding of the worker's combined output stream.

use std::collections::VecDeque;
use std::io::BufRead;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

use mprop_models::WorkerEvent;

/// What the controller needs from the stream once the worker has exited.
#[derive(Debug, Clone, Default)]
pub struct StreamSummary {
    /// Last reported output path
    pub output_path: Option<PathBuf>,
    /// Last worker-reported fatal cause
    pub fatal: Option<String>,
    /// Most recent diagnostic lines, oldest first
    pub diagnostics: VecDeque<String>,
    /// Highest progress seen
    pub progress: Option<u8>,
    /// Number of lines read
    pub lines: usize,
}

impl StreamSummary {
    /// Best available explanation of a failure.
    pub fn failure_detail(&self) -> String {
        if let Some(fatal) = &self.fatal {
            return fatal.clone();
        }
        self.diagnostics
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Shared view of the summary, updated line by line.
pub type SharedSummary = Arc<Mutex<StreamSummary>>;

/// Read `reader` to EOF, decoding each line and passing events to `sink` in order.
///
/// Consecutive duplicate progress values are dropped. Regressions are logged
/// and still relayed.
pub fn pump<R, F>(mut reader: R, summary: &SharedSummary, diagnostic_lines: usize, mut sink: F)
where
    R: BufRead,
    F: FnMut(WorkerEvent),
{
    let mut last_progress: Option<u8> = None;
    let mut buf = Vec::new();

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                warn!("Worker output stream failed: {}", e);
                break;
            }
        }

        let line = String::from_utf8_lossy(&buf);
        let event = WorkerEvent::decode(&line);

        if let WorkerEvent::Progress(percent) = event {
            if last_progress == Some(percent) {
                continue;
            }
            if let Some(previous) = last_progress.filter(|p| *p > percent) {
                warn!("Worker progress went backwards: {}% -> {}%", previous, percent);
            }
            last_progress = Some(percent);
        }

        record(summary, &event, diagnostic_lines);
        match &event {
            WorkerEvent::Stage(text) => info!("Worker stage: {}", text),
            WorkerEvent::Fatal(text) => warn!("Worker reported error: {}", text),
            WorkerEvent::Diagnostic(text) => debug!(target: "mprop::worker", "{}", text),
            _ => {}
        }
        sink(event);
    }
}

fn record(summary: &SharedSummary, event: &WorkerEvent, diagnostic_lines: usize) {
    let mut summary = match summary.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    summary.lines += 1;
    match event {
        WorkerEvent::OutputPath(path) => summary.output_path = Some(path.clone()),
        WorkerEvent::Fatal(text) => summary.fatal = Some(text.clone()),
        WorkerEvent::Progress(percent) => {
            summary.progress = Some(summary.progress.map_or(*percent, |p| p.max(*percent)));
        }
        WorkerEvent::Diagnostic(text) if diagnostic_lines > 0 => {
            if summary.diagnostics.len() == diagnostic_lines {
                summary.diagnostics.pop_front();
            }
            summary.diagnostics.push_back(text.clone());
        }
        _ => {}
    }
}

/// Copy of the current summary.
pub fn snapshot(summary: &SharedSummary) -> StreamSummary {
    match summary.lock() {
        Ok(guard) => guard.clone(),
        Err(poisoned) => poisoned.into_inner().clone(),
    }
}

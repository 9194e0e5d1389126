//! Worker process controller.
//!
//! ```text
//! Idle -> Launching -> Running -> Completed | Cancelled | Failed
//! ```
//!
//! [`WorkerController::start`] validates the descriptor, creates a per-job
//! scratch directory, spawns the worker and returns a [`JobHandle`] without
//! waiting. A supervisor task then waits for the worker to exit, for a cancel
//! request or for the optional timeout. Whatever ends the job, it kills the
//! worker's process group, removes the scratch directory and only then
//! publishes the terminal state.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::process::Child;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use mprop_models::{FrameRange, FrameTemplate, JobDescriptor, JobId, JobState, WorkerEvent};

use crate::config::ControllerConfig;
use crate::error::{ControllerError, ControllerResult};
use crate::launcher::{kill_process_group, WorkerLauncher};
use crate::stream::{pump, snapshot, SharedSummary, StreamSummary};

/// How long to keep reading after the worker exits, for output still in the pipe.
const STREAM_DRAIN_GRACE: Duration = Duration::from_secs(2);

/// What the host needs to load the written masks.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionReport {
    /// Output location as reported by the worker
    pub output_path: PathBuf,
    /// Parsed output template, when the path is a valid template
    pub template: Option<FrameTemplate>,
    /// Frame range the masks cover
    pub frame_range: FrameRange,
    /// First mask of the range, if it exists on disk
    pub first_frame: Option<PathBuf>,
}

impl CompletionReport {
    fn new(output_path: PathBuf, frame_range: FrameRange) -> Self {
        let template = FrameTemplate::parse(output_path.to_string_lossy().into_owned()).ok();
        let first_frame = template
            .as_ref()
            .map(|t| t.frame_path(frame_range.min))
            .filter(|p| p.is_file());
        Self {
            output_path,
            template,
            frame_range,
            first_frame,
        }
    }
}

/// Terminal result of a job.
#[derive(Debug)]
pub enum JobOutcome {
    Completed(CompletionReport),
    Cancelled,
    Failed(ControllerError),
}

impl JobOutcome {
    pub fn state(&self) -> JobState {
        match self {
            JobOutcome::Completed(_) => JobState::Completed,
            JobOutcome::Cancelled => JobState::Cancelled,
            JobOutcome::Failed(_) => JobState::Failed,
        }
    }
}

/// Launches workers, one job at a time.
#[derive(Debug, Clone)]
pub struct WorkerController {
    config: ControllerConfig,
    launcher: WorkerLauncher,
    busy: Arc<AtomicBool>,
}

impl WorkerController {
    pub fn new(config: ControllerConfig) -> Self {
        let launcher = WorkerLauncher::from_config(&config);
        Self {
            config,
            launcher,
            busy: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// Whether a job is between `start` and its terminal state.
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    /// Launch a worker for `descriptor`.
    ///
    /// Must be called from within a Tokio runtime. Returns once the worker is
    /// running; progress arrives through the returned handle.
    pub fn start(&self, mut descriptor: JobDescriptor) -> ControllerResult<JobHandle> {
        descriptor.validate()?;

        let busy = BusyGuard::acquire(&self.busy)?;
        let (state_tx, state_rx) = watch::channel(JobState::Idle);
        state_tx.send_replace(JobState::Launching);

        let scratch = create_scratch_dir(self.config.scratch_dir.as_deref())?;
        descriptor.scratch_root = Some(scratch.path().to_path_buf());
        let json = descriptor.to_json()?;

        info!(
            job_id = %descriptor.job_id,
            scratch = %scratch.path().display(),
            "Launching worker for {} ({} frames)",
            descriptor.source,
            descriptor.frame_range.count()
        );

        let (child, reader) = match self.launcher.spawn(&json) {
            Ok(spawned) => spawned,
            Err(e) => {
                error!(job_id = %descriptor.job_id, "{}", e);
                remove_scratch(scratch);
                state_tx.send_replace(JobState::Failed);
                return Err(e);
            }
        };
        let process_group = child.id();
        state_tx.send_replace(JobState::Running);

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (reader_done_tx, reader_done) = oneshot::channel();
        let summary = SharedSummary::default();
        let diagnostic_lines = self.config.diagnostic_lines;
        let reader_summary = Arc::clone(&summary);
        // A plain thread: a reader abandoned after the drain grace must not
        // hold up runtime shutdown.
        std::thread::spawn(move || {
            pump(
                std::io::BufReader::new(reader),
                &reader_summary,
                diagnostic_lines,
                |event| {
                    // The handle may have been dropped; the job still runs to the end.
                    let _ = event_tx.send(event);
                },
            );
            let _ = reader_done_tx.send(());
        });

        let (cancel_tx, cancel_rx) = watch::channel(false);
        let supervisor = Supervisor {
            job_id: descriptor.job_id.clone(),
            frame_range: descriptor.frame_range,
            timeout: self.config.job_timeout,
            child,
            process_group,
            reader_done,
            summary,
            cancel_rx,
            state_tx,
            scratch,
            busy,
        };
        let outcome = tokio::spawn(supervisor.run());

        Ok(JobHandle {
            job_id: descriptor.job_id,
            state_rx,
            events: event_rx,
            cancel_tx,
            outcome,
        })
    }
}

/// Handle to a started job.
#[derive(Debug)]
pub struct JobHandle {
    job_id: JobId,
    state_rx: watch::Receiver<JobState>,
    events: mpsc::UnboundedReceiver<WorkerEvent>,
    cancel_tx: watch::Sender<bool>,
    outcome: JoinHandle<JobOutcome>,
}

impl JobHandle {
    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    /// Current state.
    pub fn state(&self) -> JobState {
        *self.state_rx.borrow()
    }

    /// Receiver that observes every state change.
    pub fn subscribe(&self) -> watch::Receiver<JobState> {
        self.state_rx.clone()
    }

    /// Next status event in stream order.
    ///
    /// Returns `None` once the job is terminal and every event read before
    /// that has been delivered, even if a leftover process still holds the
    /// worker's output open.
    pub async fn next_event(&mut self) -> Option<WorkerEvent> {
        if let Ok(event) = self.events.try_recv() {
            return Some(event);
        }
        tokio::select! {
            biased;
            event = self.events.recv() => event,
            _ = self.state_rx.wait_for(|state| state.is_terminal()) => self.events.try_recv().ok(),
        }
    }

    /// Kill the worker. Only valid while running; does not wait for the kill.
    pub fn cancel(&self) -> ControllerResult<()> {
        let state = self.state();
        if state != JobState::Running {
            return Err(ControllerError::NotRunning(state));
        }
        info!(job_id = %self.job_id, "Cancelling job");
        self.cancel_tx.send_replace(true);
        Ok(())
    }

    /// Wait for the terminal outcome.
    pub async fn wait(self) -> JobOutcome {
        match self.outcome.await {
            Ok(outcome) => outcome,
            Err(e) => JobOutcome::Failed(ControllerError::internal(format!(
                "job supervisor failed: {}",
                e
            ))),
        }
    }
}

/// Releases the controller's single job slot when dropped.
struct BusyGuard(Arc<AtomicBool>);

impl BusyGuard {
    fn acquire(flag: &Arc<AtomicBool>) -> ControllerResult<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| ControllerError::JobAlreadyRunning)?;
        Ok(Self(Arc::clone(flag)))
    }
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

enum Exit {
    Exited(std::process::ExitStatus),
    Cancelled,
    TimedOut(Duration),
}

struct Supervisor {
    job_id: JobId,
    frame_range: FrameRange,
    timeout: Option<Duration>,
    child: Child,
    /// Worker pid, which is also its process group id
    process_group: Option<u32>,
    reader_done: oneshot::Receiver<()>,
    summary: SharedSummary,
    cancel_rx: watch::Receiver<bool>,
    state_tx: watch::Sender<JobState>,
    scratch: TempDir,
    busy: BusyGuard,
}

impl Supervisor {
    async fn run(mut self) -> JobOutcome {
        let exit = self.wait_for_exit().await;
        // Anything the worker started goes with it, which also closes the pipe.
        self.kill_group();

        // Collect whatever the worker wrote before exiting.
        if tokio::time::timeout(STREAM_DRAIN_GRACE, &mut self.reader_done)
            .await
            .is_err()
        {
            warn!(
                job_id = %self.job_id,
                "Worker output still open after exit, abandoning reader"
            );
        }
        let summary = snapshot(&self.summary);

        let outcome = match exit {
            Ok(exit) => self.interpret(exit, summary),
            Err(e) => JobOutcome::Failed(ControllerError::Io(e)),
        };

        remove_scratch(self.scratch);
        drop(self.busy);

        match &outcome {
            JobOutcome::Completed(report) => info!(
                job_id = %self.job_id,
                "Job completed: {}",
                report.output_path.display()
            ),
            JobOutcome::Cancelled => info!(job_id = %self.job_id, "Job cancelled"),
            JobOutcome::Failed(e) => {
                error!(job_id = %self.job_id, kind = e.kind(), "Job failed: {}", e)
            }
        }
        self.state_tx.send_replace(outcome.state());
        outcome
    }

    async fn wait_for_exit(&mut self) -> std::io::Result<Exit> {
        let timeout = self.timeout;
        let deadline = async {
            match timeout {
                Some(limit) => tokio::time::sleep(limit).await,
                None => std::future::pending::<()>().await,
            }
        };
        let cancel_rx = &mut self.cancel_rx;
        let cancelled = async {
            // A dropped handle can no longer cancel.
            if cancel_rx.wait_for(|cancel| *cancel).await.is_err() {
                std::future::pending::<()>().await;
            }
        };

        let exit = tokio::select! {
            status = self.child.wait() => return status.map(Exit::Exited),
            _ = cancelled => Exit::Cancelled,
            _ = deadline => Exit::TimedOut(timeout.unwrap_or_default()),
        };

        match &exit {
            Exit::TimedOut(limit) => warn!(
                job_id = %self.job_id,
                "Worker timed out after {:?}, killing process group",
                limit
            ),
            _ => debug!(job_id = %self.job_id, "Killing worker process group"),
        }
        self.kill_group();
        if let Err(e) = self.child.kill().await {
            // Already exited between the select and the kill.
            debug!(job_id = %self.job_id, "Kill failed: {}", e);
        }
        Ok(exit)
    }

    fn kill_group(&self) {
        if let Some(pgid) = self.process_group {
            if let Err(e) = kill_process_group(pgid) {
                warn!(job_id = %self.job_id, "Failed to kill worker process group: {}", e);
            }
        }
    }

    fn interpret(&self, exit: Exit, summary: StreamSummary) -> JobOutcome {
        match exit {
            Exit::Cancelled => JobOutcome::Cancelled,
            Exit::TimedOut(limit) => {
                JobOutcome::Failed(ControllerError::Timeout(limit.as_secs()))
            }
            Exit::Exited(status) if status.success() => match summary.output_path {
                Some(path) => {
                    let report = CompletionReport::new(path, self.frame_range);
                    if report.first_frame.is_none() {
                        warn!(
                            job_id = %self.job_id,
                            "First output frame {} not found at {}",
                            self.frame_range.min,
                            report.output_path.display()
                        );
                    }
                    JobOutcome::Completed(report)
                }
                None => JobOutcome::Failed(ControllerError::IncompleteResult),
            },
            Exit::Exited(status) => JobOutcome::Failed(ControllerError::WorkerCrashed {
                code: status.code(),
                detail: summary.failure_detail(),
            }),
        }
    }
}

fn create_scratch_dir(parent: Option<&std::path::Path>) -> ControllerResult<TempDir> {
    let mut builder = tempfile::Builder::new();
    builder.prefix("mprop-job-");
    let dir = match parent {
        Some(parent) => {
            std::fs::create_dir_all(parent)?;
            builder.tempdir_in(parent)?
        }
        None => builder.tempdir()?,
    };
    Ok(dir)
}

fn remove_scratch(scratch: TempDir) {
    let path = scratch.path().to_path_buf();
    match scratch.close() {
        Ok(()) => debug!("Removed scratch directory {}", path.display()),
        Err(e) => warn!("Failed to remove scratch directory {}: {}", path.display(), e),
    }
}

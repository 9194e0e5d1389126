//! Controller configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Controller configuration.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Worker executable, a path or a name looked up on `PATH`
    pub worker_program: PathBuf,
    /// Arguments placed before the descriptor (e.g. an interpreter script)
    pub worker_args: Vec<String>,
    /// Repository holding model checkpoints and configs
    pub model_repo: PathBuf,
    /// Parent of per-job scratch directories (system temp dir when unset)
    pub scratch_dir: Option<PathBuf>,
    /// Wall-clock ceiling per job
    pub job_timeout: Option<Duration>,
    /// Diagnostic lines kept for failure reports
    pub diagnostic_lines: usize,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            worker_program: PathBuf::from("mprop-worker"),
            worker_args: Vec::new(),
            model_repo: PathBuf::from("sam2_repo"),
            scratch_dir: None,
            job_timeout: None,
            diagnostic_lines: 50,
        }
    }
}

impl ControllerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            worker_program: std::env::var("MPROP_WORKER")
                .map(PathBuf::from)
                .unwrap_or(defaults.worker_program),
            worker_args: std::env::var("MPROP_WORKER_ARGS")
                .map(|s| s.split_whitespace().map(str::to_string).collect())
                .unwrap_or_default(),
            model_repo: std::env::var("MPROP_MODEL_REPO")
                .map(PathBuf::from)
                .unwrap_or(defaults.model_repo),
            scratch_dir: std::env::var("MPROP_SCRATCH_DIR").ok().map(PathBuf::from),
            job_timeout: std::env::var("MPROP_JOB_TIMEOUT")
                .ok()
                .and_then(|s| s.parse::<u64>().ok())
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
            diagnostic_lines: std::env::var("MPROP_DIAGNOSTIC_LINES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.diagnostic_lines),
        }
    }

    pub fn with_worker(mut self, program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        self.worker_program = program.into();
        self.worker_args = args;
        self
    }

    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = Some(dir.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.job_timeout = Some(timeout);
        self
    }
}

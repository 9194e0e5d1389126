//! Worker process launcher.

use std::io::PipeReader;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::{Child, Command};
use tracing::debug;

use crate::config::ControllerConfig;
use crate::error::{ControllerError, ControllerResult};

/// Spawns the worker with the descriptor as its last argument.
#[derive(Debug, Clone)]
pub struct WorkerLauncher {
    program: PathBuf,
    args: Vec<String>,
}

impl WorkerLauncher {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    pub fn from_config(config: &ControllerConfig) -> Self {
        Self::new(config.worker_program.clone(), config.worker_args.clone())
    }

    /// Locate the worker executable.
    ///
    /// Bare names are looked up on `PATH`; anything with a directory component
    /// must exist as given.
    pub fn resolve(&self) -> ControllerResult<PathBuf> {
        if is_bare_name(&self.program) {
            return which::which(&self.program).map_err(|e| {
                ControllerError::launch_failed(format!(
                    "'{}' not found in PATH: {}",
                    self.program.display(),
                    e
                ))
            });
        }
        if !self.program.is_file() {
            return Err(ControllerError::launch_failed(format!(
                "'{}' does not exist",
                self.program.display()
            )));
        }
        Ok(self.program.clone())
    }

    /// Spawn the worker.
    ///
    /// stdout and stderr share one pipe, so the returned reader sees both
    /// streams in the order the worker wrote them. On Unix the worker leads a
    /// new process group whose id is its pid; see [`kill_process_group`].
    pub fn spawn(&self, descriptor_json: &str) -> ControllerResult<(Child, PipeReader)> {
        let program = self.resolve()?;
        let (reader, writer) = std::io::pipe()?;
        let stderr = writer.try_clone()?;

        debug!(
            "Launching worker: {} {} <descriptor>",
            program.display(),
            self.args.join(" ")
        );

        let mut command = Command::new(&program);
        command
            .args(&self.args)
            .arg(descriptor_json)
            .stdin(Stdio::null())
            .stdout(Stdio::from(writer))
            .stderr(Stdio::from(stderr))
            .kill_on_drop(true);
        #[cfg(unix)]
        command.process_group(0);

        let child = command
            .spawn()
            .map_err(|e| ControllerError::launch_failed(format!("{}: {}", program.display(), e)))?;

        // The command holds our copies of the write end; EOF only arrives once
        // they are closed.
        drop(command);

        Ok((child, reader))
    }
}

/// SIGKILL every process in the group led by the worker `pgid`.
///
/// An empty group is not an error.
#[cfg(unix)]
pub fn kill_process_group(pgid: u32) -> std::io::Result<()> {
    use nix::errno::Errno;
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    match killpg(Pid::from_raw(pgid as i32), Signal::SIGKILL) {
        Ok(()) | Err(Errno::ESRCH) => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Process groups are Unix only; elsewhere only the worker itself is killed.
#[cfg(not(unix))]
pub fn kill_process_group(_pgid: u32) -> std::io::Result<()> {
    Ok(())
}

fn is_bare_name(program: &Path) -> bool {
    program.components().count() == 1 && !program.is_absolute()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_names() {
        assert!(is_bare_name(Path::new("mprop-worker")));
        assert!(!is_bare_name(Path::new("./mprop-worker")));
        assert!(!is_bare_name(Path::new("/usr/bin/python3")));
    }

    #[test]
    fn test_missing_worker() {
        let launcher = WorkerLauncher::new("/nonexistent/mprop-worker", vec![]);
        assert!(matches!(
            launcher.resolve(),
            Err(ControllerError::WorkerLaunchFailure(_))
        ));

        let launcher = WorkerLauncher::new("mprop-worker-that-does-not-exist", vec![]);
        assert!(matches!(
            launcher.resolve(),
            Err(ControllerError::WorkerLaunchFailure(_))
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_worker_leads_its_own_process_group() {
        let launcher = WorkerLauncher::new("sh", vec!["-c".into(), "sleep 30".into(), "sh".into()]);
        let (mut child, _reader) = launcher.spawn("{}").unwrap();
        let pid = child.id().unwrap();

        let pgid = nix::unistd::getpgid(Some(nix::unistd::Pid::from_raw(pid as i32))).unwrap();
        assert_eq!(pgid.as_raw(), pid as i32);
        assert_ne!(pgid, nix::unistd::getpgrp());

        kill_process_group(pid).unwrap();
        assert!(!child.wait().await.unwrap().success());
        // The group is gone now.
        kill_process_group(pid).unwrap();
    }
}

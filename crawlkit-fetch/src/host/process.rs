//! Child processes in their own process group.
//!
//! Every child is started as the leader of a new process group so that a
//! timeout kills the whole tree it spawned, not just the direct child. The
//! [`ChildGuard`] owns the child and kills the group on drop unless the child
//! was already reaped, which also covers futures dropped mid-await.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};
use tokio::io::AsyncReadExt;
use tokio::process::{Child, ChildStderr, Command};
use tracing::{debug, instrument, warn};

use crate::error::ProcessError;

/// Time allowed to drain stderr after the child exited.
const STDERR_GRACE: Duration = Duration::from_millis(250);

/// Stderr kept for error messages.
const MAX_STDERR_BYTES: usize = 4096;

// ============================================================================
// Process Output
// ============================================================================

/// Result of a child that ran to completion.
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    /// Standard error content (truncated).
    pub stderr: String,
    /// Exit code (-1 when killed by a signal).
    pub exit_code: i32,
    /// How long the command took to execute.
    pub duration: Duration,
}

impl ProcessOutput {
    /// Returns true if the command succeeded (exit code 0).
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Converts a failed run into an error, keeping stderr.
    pub fn exit_error(&self) -> Option<ProcessError> {
        (!self.success()).then(|| ProcessError::NonZeroExit {
            code: self.exit_code,
            stderr: self.stderr.trim().to_string(),
        })
    }
}

// ============================================================================
// Child Guard
// ============================================================================

/// Owns a spawned child and kills its process group unless it was reaped.
#[derive(Debug)]
pub struct ChildGuard {
    child: Child,
    pid: Option<u32>,
    reaped: bool,
}

impl ChildGuard {
    /// Spawns `command` as a new process group leader.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessError::SpawnFailed`] if the OS refuses to start it.
    pub fn spawn(command: &mut Command) -> Result<Self, ProcessError> {
        #[cfg(unix)]
        command.process_group(0);
        command.kill_on_drop(true);

        let child = command
            .spawn()
            .map_err(|e| ProcessError::SpawnFailed(e.to_string()))?;
        let pid = child.id();
        debug!(pid = ?pid, "Spawned child process");

        Ok(Self {
            child,
            pid,
            reaped: false,
        })
    }

    /// OS process id (also the process group id).
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Takes the stderr pipe, if it was requested.
    pub fn take_stderr(&mut self) -> Option<ChildStderr> {
        self.child.stderr.take()
    }

    /// Waits for the child, killing the group if `timeout` elapses first.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessError::Timeout`] after killing the group, or an IO
    /// error if waiting failed.
    pub async fn wait_timeout(&mut self, timeout: Duration) -> Result<ExitStatus, ProcessError> {
        match tokio::time::timeout(timeout, self.child.wait()).await {
            Ok(status) => {
                self.reaped = true;
                Ok(status?)
            }
            Err(_) => {
                warn!(pid = ?self.pid, timeout = ?timeout, "Child timed out, killing process group");
                self.kill().await;
                Err(ProcessError::Timeout(timeout))
            }
        }
    }

    /// Kills the process group and reaps the child.
    pub async fn kill(&mut self) {
        if self.reaped {
            return;
        }
        self.kill_group();
        if let Err(e) = self.child.kill().await {
            debug!(error = %e, "Child already gone");
        }
        self.reaped = true;
    }

    fn kill_group(&self) {
        #[cfg(unix)]
        if let Some(pid) = self.pid.and_then(|pid| i32::try_from(pid).ok()) {
            use nix::sys::signal::{Signal, killpg};
            use nix::unistd::Pid;

            if let Err(e) = killpg(Pid::from_raw(pid), Signal::SIGKILL) {
                debug!(pid, error = %e, "killpg failed");
            }
        }
    }
}

impl Drop for ChildGuard {
    fn drop(&mut self) {
        if !self.reaped {
            debug!(pid = ?self.pid, "Killing unreaped child on drop");
            self.kill_group();
            // kill_on_drop handles the direct child where process groups are unavailable.
        }
    }
}

// ============================================================================
// Process Runner
// ============================================================================

/// Runs external programs under a timeout.
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner;

impl ProcessRunner {
    /// Creates a new process runner.
    pub fn new() -> Self {
        Self
    }

    /// Runs a program with arguments, capturing stderr.
    ///
    /// Stdout is discarded; programs driven this way report through files.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessError::NotFound`] if the program cannot be located,
    /// [`ProcessError::Timeout`] after killing the group on timeout, or a
    /// spawn/IO error. A non-zero exit is not an error here.
    #[instrument(skip(self, args), fields(program = %program))]
    pub async fn run_with_timeout<S: AsRef<OsStr>>(
        &self,
        program: &str,
        args: &[S],
        timeout: Duration,
    ) -> Result<ProcessOutput, ProcessError> {
        let path = self.which(program).ok_or_else(|| {
            warn!(program = %program, "Command not found");
            ProcessError::NotFound(program.to_string())
        })?;

        let start = Instant::now();
        let mut command = Command::new(&path);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        let mut guard = ChildGuard::spawn(&mut command)?;
        let drain = guard.take_stderr().map(|pipe| tokio::spawn(drain_stderr(pipe)));
        let status = guard.wait_timeout(timeout).await;

        let stderr = match drain {
            Some(handle) => collect_stderr(handle).await,
            None => String::new(),
        };
        let status = status?;

        let output = ProcessOutput {
            stderr,
            exit_code: status.code().unwrap_or(-1),
            duration: start.elapsed(),
        };
        debug!(
            exit_code = output.exit_code,
            duration = ?output.duration,
            stderr_len = output.stderr.len(),
            "Command completed"
        );
        Ok(output)
    }

    /// Check if a command exists.
    pub fn command_exists(&self, cmd: &str) -> bool {
        self.which(cmd).is_some()
    }

    /// Resolves a command: paths are used as given, bare names searched on `PATH`.
    pub fn which(&self, cmd: &str) -> Option<PathBuf> {
        let path = Path::new(cmd);
        if path.components().count() > 1 {
            return path.is_file().then(|| path.to_path_buf());
        }
        which::which(cmd).ok()
    }
}

/// Reads stderr until EOF, keeping the first [`MAX_STDERR_BYTES`].
async fn drain_stderr(mut pipe: ChildStderr) -> Vec<u8> {
    let mut kept = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        match pipe.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                let room = MAX_STDERR_BYTES.saturating_sub(kept.len());
                kept.extend_from_slice(&chunk[..n.min(room)]);
            }
        }
    }
    kept
}

/// Waits briefly for the drain task; grandchildren may hold stderr open.
async fn collect_stderr(mut handle: tokio::task::JoinHandle<Vec<u8>>) -> String {
    match tokio::time::timeout(STDERR_GRACE, &mut handle).await {
        Ok(Ok(bytes)) => String::from_utf8_lossy(&bytes).into_owned(),
        Ok(Err(e)) => {
            debug!(error = %e, "Stderr reader failed");
            String::new()
        }
        Err(_) => {
            debug!("Stderr still open after exit, dropping it");
            handle.abort();
            String::new()
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_which() {
        let runner = ProcessRunner::new();
        assert!(runner.which("sh").is_some());
        assert!(runner.which("not_a_command_xyz").is_none());
        assert!(runner.which("/definitely/not/here").is_none());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_captures_exit_and_stderr() {
        let runner = ProcessRunner::new();
        let output = runner
            .run_with_timeout("sh", &["-c", "echo oops >&2; exit 3"], Duration::from_secs(5))
            .await
            .unwrap();

        assert!(!output.success());
        assert_eq!(output.exit_code, 3);
        assert_eq!(output.stderr.trim(), "oops");
        assert!(matches!(
            output.exit_error(),
            Some(ProcessError::NonZeroExit { code: 3, .. })
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_timeout_kills_child() {
        use nix::sys::signal::kill;
        use nix::unistd::Pid;

        let mut command = Command::new("sh");
        command.args(["-c", "sleep 30 & wait"]);
        let mut guard = ChildGuard::spawn(&mut command).unwrap();
        let pid = guard.pid().unwrap();

        let result = guard.wait_timeout(Duration::from_millis(200)).await;
        assert!(matches!(result, Err(ProcessError::Timeout(_))));
        assert!(kill(Pid::from_raw(i32::try_from(pid).unwrap()), None).is_err());
    }

    #[tokio::test]
    async fn test_run_not_found() {
        let runner = ProcessRunner::new();
        let result = runner
            .run_with_timeout::<&str>("not_a_real_command_xyz", &[], Duration::from_secs(1))
            .await;
        assert!(matches!(result, Err(ProcessError::NotFound(_))));
    }
}

// crates/server/src/jobs/supervisor.rs
//! Launching and killing the external download tool.

use std::io;
use std::path::Path;
use std::process::{ExitStatus, Output, Stdio};

use tokio::process::{Child, ChildStderr, ChildStdout, Command};
use tokio_util::sync::CancellationToken;

use super::error::JobError;
use crate::config::ToolConfig;

/// Kill capability for a running process, stored on its job.
///
/// Killing only raises a flag; the task waiting on the process performs
/// the actual kill, so calling it repeatedly or after exit is harmless.
#[derive(Debug, Clone)]
pub struct ProcessHandle {
    pid: Option<u32>,
    kill: CancellationToken,
}

impl ProcessHandle {
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn kill(&self) {
        self.kill.cancel();
    }

    pub fn is_killed(&self) -> bool {
        self.kill.is_cancelled()
    }
}

/// A launched process whose output streams have not been taken yet.
pub struct RunningProcess {
    child: Child,
    handle: ProcessHandle,
}

impl RunningProcess {
    pub fn handle(&self) -> ProcessHandle {
        self.handle.clone()
    }

    pub fn take_stdout(&mut self) -> Option<ChildStdout> {
        self.child.stdout.take()
    }

    pub fn take_stderr(&mut self) -> Option<ChildStderr> {
        self.child.stderr.take()
    }

    /// Wait for the process to exit, killing it if the handle is killed first.
    pub async fn wait(mut self) -> io::Result<ExitStatus> {
        tokio::select! {
            status = self.child.wait() => status,
            _ = self.handle.kill.cancelled() => {
                if let Err(e) = self.child.start_kill() {
                    // Raced with a normal exit.
                    tracing::debug!(pid = ?self.handle.pid, error = %e, "kill skipped");
                }
                self.child.wait().await
            }
        }
    }
}

/// Spawns the configured tool with piped output.
#[derive(Debug, Clone)]
pub struct ProcessSupervisor {
    tool: ToolConfig,
}

impl ProcessSupervisor {
    pub fn new(tool: ToolConfig) -> Self {
        Self { tool }
    }

    pub fn program(&self) -> &str {
        &self.tool.program
    }

    fn command(&self, args: &[String], working_dir: &Path) -> Command {
        let mut cmd = Command::new(&self.tool.program);
        cmd.args(&self.tool.leading_args)
            .args(args)
            .current_dir(working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    fn launch_error(&self, source: io::Error) -> JobError {
        tracing::error!(program = %self.tool.program, error = %source, "failed to spawn download tool");
        JobError::Launch {
            program: self.tool.program.clone(),
            source,
        }
    }

    /// Start the tool. Nothing runs in the background if this fails.
    pub fn launch(&self, args: &[String], working_dir: &Path) -> Result<RunningProcess, JobError> {
        let child = self
            .command(args, working_dir)
            .spawn()
            .map_err(|e| self.launch_error(e))?;

        let handle = ProcessHandle {
            pid: child.id(),
            kill: CancellationToken::new(),
        };
        tracing::debug!(program = %self.tool.program, pid = ?handle.pid, "download tool started");

        Ok(RunningProcess { child, handle })
    }

    /// Run the tool to completion and collect both streams. The process is
    /// killed if the returned future is dropped.
    pub async fn output(&self, args: &[String], working_dir: &Path) -> Result<Output, JobError> {
        self.command(args, working_dir)
            .output()
            .await
            .map_err(|e| self.launch_error(e))
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::Duration;

    fn sh(script: &str) -> (ProcessSupervisor, Vec<String>) {
        let supervisor = ProcessSupervisor::new(ToolConfig {
            program: "sh".into(),
            leading_args: vec!["-c".into(), script.into()],
        });
        (supervisor, Vec::new())
    }

    #[tokio::test]
    async fn test_launch_and_wait_exit_code() {
        let dir = tempfile::tempdir().unwrap();
        let (supervisor, args) = sh("exit 3");
        let process = supervisor.launch(&args, dir.path()).unwrap();
        let status = process.wait().await.unwrap();
        assert_eq!(status.code(), Some(3));
    }

    #[tokio::test]
    async fn test_launch_missing_program() {
        let dir = tempfile::tempdir().unwrap();
        let supervisor = ProcessSupervisor::new(ToolConfig {
            program: "/nonexistent/mediadl-tool".into(),
            leading_args: Vec::new(),
        });
        let err = supervisor.launch(&[], dir.path()).err().unwrap();
        assert!(matches!(err, JobError::Launch { .. }));
    }

    #[tokio::test]
    async fn test_kill_terminates_running_process() {
        let dir = tempfile::tempdir().unwrap();
        let (supervisor, args) = sh("exec sleep 30");
        let process = supervisor.launch(&args, dir.path()).unwrap();
        let handle = process.handle();
        assert!(handle.pid().is_some());

        handle.kill();
        handle.kill();
        let status = tokio::time::timeout(Duration::from_secs(5), process.wait())
            .await
            .expect("process should be killed promptly")
            .unwrap();
        assert!(!status.success());
        assert!(handle.is_killed());
    }

    #[tokio::test]
    async fn test_kill_after_exit_is_harmless() {
        let dir = tempfile::tempdir().unwrap();
        let (supervisor, args) = sh("exit 0");
        let process = supervisor.launch(&args, dir.path()).unwrap();
        let handle = process.handle();
        let status = process.wait().await.unwrap();
        assert!(status.success());
        handle.kill();
    }

    #[tokio::test]
    async fn test_output_runs_in_working_dir() {
        let dir = tempfile::tempdir().unwrap();
        let (supervisor, args) = sh("pwd; echo oops >&2");
        let output = supervisor.output(&args, dir.path()).await.unwrap();
        let stdout = String::from_utf8_lossy(&output.stdout);
        let expected = dir.path().canonicalize().unwrap();
        assert_eq!(stdout.trim(), expected.to_string_lossy());
        assert_eq!(String::from_utf8_lossy(&output.stderr).trim(), "oops");
    }
}

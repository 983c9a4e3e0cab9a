//! Handle to the running bundler process

use std::time::{Duration, Instant};

use tokio::process::Child;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::{
    command::LaunchCommand,
    error::{ProcessError, Result},
};

/// The one warm bundler process, shared by every build
pub struct CompilerProcess {
    /// Underlying tokio child process
    child: Mutex<Child>,
    /// Command the process was launched with
    command: LaunchCommand,
    /// Process ID
    pid: u32,
    /// Launch time
    started_at: Instant,
}

impl CompilerProcess {
    pub(crate) fn new(child: Child, command: LaunchCommand) -> Self {
        let pid = child.id().unwrap_or(0);
        Self {
            child: Mutex::new(child),
            command,
            pid,
            started_at: Instant::now(),
        }
    }

    /// Get process ID
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Command this process was launched with
    pub fn command(&self) -> &LaunchCommand {
        &self.command
    }

    /// Time since launch
    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Check if process is still running
    pub async fn is_running(&self) -> bool {
        matches!(self.child.lock().await.try_wait(), Ok(None))
    }

    /// Close the process.
    ///
    /// Sends SIGTERM (unix) and waits up to `grace`, then kills.
    pub async fn shutdown(&self, grace: Duration) -> Result<()> {
        let mut child = self.child.lock().await;
        if !matches!(child.try_wait(), Ok(None)) {
            return Ok(());
        }

        debug!(pid = %self.pid, "Shutting down compiler process");

        #[cfg(unix)]
        {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;

            if let Err(e) = kill(Pid::from_raw(self.pid as i32), Signal::SIGTERM) {
                warn!(pid = %self.pid, error = %e, "Failed to send SIGTERM");
            }

            match tokio::time::timeout(grace, child.wait()).await {
                Ok(Ok(status)) => {
                    debug!(pid = %self.pid, %status, "Compiler process exited");
                    return Ok(());
                }
                Ok(Err(e)) => {
                    warn!(pid = %self.pid, error = %e, "Error waiting for compiler process");
                }
                Err(_) => {
                    warn!(pid = %self.pid, "Compiler process ignored SIGTERM, killing");
                }
            }
        }

        if let Err(e) = child.kill().await {
            warn!(pid = %self.pid, error = %e, "Failed to kill compiler process");
            return Err(ProcessError::KillFailed(e.to_string()));
        }

        match tokio::time::timeout(grace, child.wait()).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(ProcessError::KillFailed(e.to_string())),
            Err(_) => Err(ProcessError::Timeout {
                seconds: grace.as_secs(),
            }),
        }
    }
}

impl std::fmt::Debug for CompilerProcess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompilerProcess")
            .field("pid", &self.pid)
            .field("command", &self.command.to_string())
            .finish()
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::process::Stdio;

    fn spawn(program: &str, args: &[&str]) -> CompilerProcess {
        let child = tokio::process::Command::new(program)
            .args(args)
            .stdout(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .unwrap();
        CompilerProcess::new(child, LaunchCommand::new(program).args(args.iter().copied()))
    }

    #[tokio::test]
    async fn test_is_running() {
        let process = spawn("sleep", &["10"]);
        assert!(process.pid() > 0);
        assert!(process.is_running().await);

        process.shutdown(Duration::from_secs(5)).await.unwrap();
        assert!(!process.is_running().await);
    }

    #[tokio::test]
    async fn test_shutdown_after_exit_is_noop() {
        let process = spawn("true", &[]);
        tokio::time::sleep(Duration::from_millis(200)).await;

        process.shutdown(Duration::from_secs(1)).await.unwrap();
        assert!(!process.is_running().await);
    }

    #[tokio::test]
    async fn test_shutdown_kills_process_ignoring_sigterm() {
        let process = spawn("sh", &["-c", "trap '' TERM; while true; do sleep 1; done"]);
        tokio::time::sleep(Duration::from_millis(200)).await;

        process.shutdown(Duration::from_millis(300)).await.unwrap();
        assert!(!process.is_running().await);
    }
}

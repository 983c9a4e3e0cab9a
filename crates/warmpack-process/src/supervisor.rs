//! Process supervisor - owns the single warm bundler process

use std::process::Stdio;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{ChildStderr, Command};
use tokio::sync::OnceCell;
use tracing::{debug, error, info, warn};

use crate::{
    child::CompilerProcess,
    command::{CommandPolicy, LaunchCommand},
    error::{ProcessError, Result},
    monitor::SignalMonitor,
};

/// Default grace period between SIGTERM and SIGKILL
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Creates the bundler process on first use and hands out the same handle
/// afterwards.
///
/// The handle lives in a create-once cell, so concurrent first callers
/// still spawn a single process. Arguments of later calls never relaunch
/// it; see [`CommandPolicy`].
pub struct ProcessSupervisor {
    /// The warm process, once launched
    process: OnceCell<Arc<CompilerProcess>>,
    /// Monitor that receives the process stdout
    monitor: SignalMonitor,
    /// Handling of differing launch commands
    policy: CommandPolicy,
    /// Grace period used by [`shutdown`](Self::shutdown)
    shutdown_timeout: Duration,
    /// Number of processes spawned so far
    launches: AtomicUsize,
}

impl ProcessSupervisor {
    /// Create a supervisor feeding `monitor`
    pub fn new(monitor: SignalMonitor) -> Self {
        Self {
            process: OnceCell::new(),
            monitor,
            policy: CommandPolicy::default(),
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            launches: AtomicUsize::new(0),
        }
    }

    /// Set the differing-command policy
    pub fn with_policy(mut self, policy: CommandPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Set the shutdown grace period
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Monitor attached to the process output
    pub fn monitor(&self) -> &SignalMonitor {
        &self.monitor
    }

    /// Number of processes spawned, at most one
    pub fn launch_count(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }

    /// The running process, if one was launched
    pub fn current(&self) -> Option<Arc<CompilerProcess>> {
        self.process.get().cloned()
    }

    /// Return the warm process, spawning it with `command` on first use
    ///
    /// # Examples
    /// ```no_run
    /// use warmpack_process::{build_command, ProcessSupervisor, SignalMarkers, SignalMonitor};
    ///
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let supervisor = ProcessSupervisor::new(SignalMonitor::new(SignalMarkers::default()));
    /// let command = build_command("webpack-cli", "webpack.config.js", None, &[]);
    /// let process = supervisor.get_or_create(&command).await?;
    /// println!("bundler running as pid {}", process.pid());
    /// # Ok(())
    /// # }
    /// ```
    pub async fn get_or_create(&self, command: &LaunchCommand) -> Result<Arc<CompilerProcess>> {
        let process = self
            .process
            .get_or_try_init(|| self.spawn(command))
            .await?
            .clone();

        if process.command() != command {
            match self.policy {
                CommandPolicy::Ignore => {
                    warn!(
                        pid = %process.pid(),
                        running = %process.command(),
                        requested = %command,
                        "Launch arguments changed, reusing the running compiler process"
                    );
                }
                CommandPolicy::Reject => {
                    return Err(ProcessError::CommandMismatch {
                        running: process.command().to_string(),
                        requested: command.to_string(),
                    });
                }
            }
        }

        Ok(process)
    }

    /// Close the process if one is running. Best effort.
    pub async fn shutdown(&self) -> Result<()> {
        match self.process.get() {
            Some(process) => process.shutdown(self.shutdown_timeout).await,
            None => Ok(()),
        }
    }

    async fn spawn(&self, command: &LaunchCommand) -> Result<Arc<CompilerProcess>> {
        debug!(command = %command, "Spawning compiler process");

        let mut child = Command::new(&command.program)
            .args(&command.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                error!(command = %command, error = %e, "Failed to spawn compiler process");
                ProcessError::SpawnFailed {
                    command: command.to_string(),
                    source: e,
                }
            })?;

        self.launches.fetch_add(1, Ordering::SeqCst);

        if let Some(stdout) = child.stdout.take() {
            self.monitor.attach(stdout);
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(forward_stderr(stderr));
        }

        let process = CompilerProcess::new(child, command.clone());
        info!(pid = %process.pid(), command = %command, "Compiler process spawned");

        Ok(Arc::new(process))
    }
}

async fn forward_stderr(stderr: ChildStderr) {
    let mut lines = BufReader::new(stderr).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => info!(target: "warmpack::bundler", "{}", line),
            Ok(None) => break,
            Err(e) => {
                debug!(error = %e, "Stopped reading bundler stderr");
                break;
            }
        }
    }
}

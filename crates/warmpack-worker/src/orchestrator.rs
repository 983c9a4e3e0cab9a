//! Build orchestration
//!
//! One build walks `Idle -> Launching -> AwaitingSignal -> Resolved`:
//!
//! ```text
//!  request ──► stamp token + claim signal ──► get_or_create(process)
//!                                                   │
//!                                  ┌────────────────┘
//!                                  ▼
//!                       wait for CompletionSignal (deadline)
//!                                  │
//!        ┌──────────────┬──────────┴───────────┬────────────────┐
//!        ▼              ▼                      ▼                ▼
//!     Failed       Finished + stale    Finished + clean   Finished + diagnostics
//!     (error)        (Cancelled)        (Succeeded)         (Diagnostics)
//! ```

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};
use warmpack_process::{CompletionSignal, PendingSignal, ProcessSupervisor, SignalMonitor};

use crate::{
    cancellation::{CancellationGuard, CancellationToken},
    config::WorkerSettings,
    error::{Result, WorkerError},
    protocol::WorkHandler,
    request::BuildRequest,
};

/// How a build that did not fail ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildOutcome {
    /// Finished with no diagnostics
    Succeeded,
    /// Finished, but the bundler reported diagnostics
    Diagnostics(Vec<String>),
    /// Superseded by a newer request before it was finalized
    Cancelled,
}

impl BuildOutcome {
    /// Only a clean, current build counts as success
    pub fn is_success(&self) -> bool {
        matches!(self, BuildOutcome::Succeeded)
    }
}

/// Per-request entry point tying the supervisor, the signal monitor and
/// the cancellation guard together
pub struct BuildOrchestrator {
    supervisor: Arc<ProcessSupervisor>,
    monitor: SignalMonitor,
    guard: CancellationGuard,
    /// Held while a build takes its stamp and signal slot, so stamp order
    /// and slot order agree on any runtime
    admission: Mutex<()>,
    build_timeout: Option<Duration>,
}

impl BuildOrchestrator {
    /// Create an orchestrator over an existing supervisor
    pub fn new(supervisor: Arc<ProcessSupervisor>) -> Self {
        let monitor = supervisor.monitor().clone();
        Self {
            supervisor,
            monitor,
            guard: CancellationGuard::new(),
            admission: Mutex::new(()),
            build_timeout: None,
        }
    }

    /// Wire up monitor, supervisor and deadline from settings
    pub fn from_settings(settings: &WorkerSettings) -> Result<Self> {
        let monitor = SignalMonitor::new(settings.markers()?);
        let supervisor = ProcessSupervisor::new(monitor)
            .with_policy(settings.command_policy)
            .with_shutdown_timeout(settings.shutdown_timeout());

        Ok(Self::new(Arc::new(supervisor)).with_build_timeout(settings.build_timeout()))
    }

    /// Set the build deadline (`None` waits forever)
    pub fn with_build_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.build_timeout = timeout;
        self
    }

    /// Supervisor owning the compiler process
    pub fn supervisor(&self) -> &Arc<ProcessSupervisor> {
        &self.supervisor
    }

    /// Run one build to its outcome.
    ///
    /// A failed compile is always an error, even for a superseded build.
    pub async fn build(&self, request: BuildRequest) -> Result<BuildOutcome> {
        // Claim the signal before the process exists so the first compile
        // after launch cannot slip past
        let (token, pending) = self.admit();
        let build_id = pending.id();
        debug!(build_id, timestamp = token.timestamp(), "Build requested");

        let command = request.command();
        let process = match self.supervisor.get_or_create(&command).await {
            Ok(process) => process,
            Err(e) => {
                pending.abandon();
                return Err(e.into());
            }
        };
        debug!(build_id, pid = %process.pid(), "Awaiting completion signal");

        let signal = match self.await_signal(pending).await {
            Ok(signal) => signal,
            Err(WorkerError::BuildTimeout { .. }) if token.is_stale() => {
                info!(build_id, "Superseded build timed out, treating as cancelled");
                return Ok(BuildOutcome::Cancelled);
            }
            Err(e) => return Err(e),
        };

        resolve(build_id, signal, &token)
    }

    /// Build from raw request arguments, `true` only for a clean success
    pub async fn emit_once(&self, args: Vec<String>) -> Result<bool> {
        let request = BuildRequest::from_args(args)?;
        let outcome = self.build(request).await?;
        Ok(outcome.is_success())
    }

    /// Close the compiler process. Best effort.
    pub async fn shutdown(&self) -> Result<()> {
        self.supervisor.shutdown().await.map_err(Into::into)
    }

    fn admit(&self) -> (CancellationToken, PendingSignal) {
        let _admission = self.admission.lock();
        (self.guard.stamp(), self.monitor.register())
    }

    async fn await_signal(&self, pending: PendingSignal) -> Result<CompletionSignal> {
        match self.build_timeout {
            Some(timeout) => tokio::time::timeout(timeout, pending.wait())
                .await
                .map_err(|_| WorkerError::BuildTimeout {
                    seconds: timeout.as_secs(),
                })?
                .map_err(Into::into),
            None => pending.wait().await.map_err(Into::into),
        }
    }
}

fn resolve(build_id: u64, signal: CompletionSignal, token: &CancellationToken) -> Result<BuildOutcome> {
    match signal {
        CompletionSignal::Failed { diagnostics } => {
            error!(build_id, diagnostics = diagnostics.len(), "Build failed");
            Err(WorkerError::CompilationFailed { diagnostics })
        }
        CompletionSignal::Finished { .. } if token.is_stale() => {
            info!(build_id, "Build superseded by a newer request, discarding result");
            Ok(BuildOutcome::Cancelled)
        }
        CompletionSignal::Finished { diagnostics } if diagnostics.is_empty() => {
            info!(build_id, "Build succeeded");
            Ok(BuildOutcome::Succeeded)
        }
        CompletionSignal::Finished { diagnostics } => {
            for line in &diagnostics {
                warn!(build_id, "{}", line);
            }
            warn!(build_id, diagnostics = diagnostics.len(), "Build finished with diagnostics");
            Ok(BuildOutcome::Diagnostics(diagnostics))
        }
    }
}

#[async_trait]
impl WorkHandler for BuildOrchestrator {
    async fn handle(&self, arguments: Vec<String>) -> Result<bool> {
        self.emit_once(arguments).await
    }
}

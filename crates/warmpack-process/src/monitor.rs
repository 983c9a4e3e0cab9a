//! Output signal monitor
//!
//! Watches the bundler's stdout for the lifetime of the process and turns
//! sentinel lines into [`CompletionSignal`]s. Each build registers a
//! one-shot waiter before it touches the process; signals are handed to
//! waiters in registration order, so one compile answers exactly one build.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use regex::Regex;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{ProcessError, Result};

/// Default sentinel printed by the bundler plugin after a good compile
pub const DEFAULT_FINISHED_MARKER: &str = "WEBPACK_BAZEL_PLUGIN_COMPILATION_FINISHED";
/// Default sentinel printed by the bundler plugin after a failed compile
pub const DEFAULT_FAILED_MARKER: &str = "WEBPACK_BAZEL_PLUGIN_COMPILATION_FAILED";
/// Default pattern for lines counted as diagnostics
pub const DEFAULT_DIAGNOSTIC_PATTERN: &str = r"^\s*ERROR\b";
/// Diagnostic lines kept per signal; later ones are counted and dropped
pub const MAX_DIAGNOSTICS_PER_SIGNAL: usize = 1000;

/// Outcome announced by the bundler on its output stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionSignal {
    /// Finished marker seen
    Finished {
        /// Diagnostic lines seen since the previous signal
        diagnostics: Vec<String>,
    },
    /// Failed marker seen
    Failed {
        /// Diagnostic lines seen since the previous signal
        diagnostics: Vec<String>,
    },
}

impl CompletionSignal {
    /// Diagnostics carried by the signal
    pub fn diagnostics(&self) -> &[String] {
        match self {
            CompletionSignal::Finished { diagnostics } | CompletionSignal::Failed { diagnostics } => {
                diagnostics
            }
        }
    }
}

/// The text the monitor looks for
#[derive(Debug, Clone)]
pub struct SignalMarkers {
    finished: String,
    failed: String,
    diagnostic_patterns: Vec<Regex>,
}

impl SignalMarkers {
    /// Build markers, compiling the diagnostic patterns
    pub fn new<I, S>(finished: impl Into<String>, failed: impl Into<String>, patterns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let finished = finished.into();
        let failed = failed.into();

        if finished.is_empty() || failed.is_empty() {
            return Err(ProcessError::InvalidConfig(
                "signal markers must not be empty".to_string(),
            ));
        }
        if finished == failed {
            return Err(ProcessError::InvalidConfig(format!(
                "finished and failed markers are both `{}`",
                finished
            )));
        }

        let diagnostic_patterns = patterns
            .into_iter()
            .map(|pattern| {
                Regex::new(pattern.as_ref()).map_err(|e| {
                    ProcessError::InvalidConfig(format!(
                        "invalid diagnostic pattern `{}`: {}",
                        pattern.as_ref(),
                        e
                    ))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            finished,
            failed,
            diagnostic_patterns,
        })
    }

    /// Finished marker
    pub fn finished(&self) -> &str {
        &self.finished
    }

    /// Failed marker
    pub fn failed(&self) -> &str {
        &self.failed
    }

    fn is_diagnostic(&self, line: &str) -> bool {
        self.diagnostic_patterns.iter().any(|p| p.is_match(line))
    }
}

impl Default for SignalMarkers {
    fn default() -> Self {
        Self {
            finished: DEFAULT_FINISHED_MARKER.to_string(),
            failed: DEFAULT_FAILED_MARKER.to_string(),
            diagnostic_patterns: Regex::new(DEFAULT_DIAGNOSTIC_PATTERN)
                .map(|p| vec![p])
                .unwrap_or_default(),
        }
    }
}

struct Waiter {
    id: u64,
    tx: oneshot::Sender<CompletionSignal>,
}

#[derive(Default)]
struct MonitorState {
    waiters: VecDeque<Waiter>,
    diagnostics: Vec<String>,
    dropped_diagnostics: usize,
    next_id: u64,
    closed: bool,
}

struct MonitorInner {
    markers: SignalMarkers,
    state: Mutex<MonitorState>,
}

/// Sentinel scanner shared between the supervisor (which attaches stdout)
/// and the orchestrator (which registers waiters)
#[derive(Clone)]
pub struct SignalMonitor {
    inner: Arc<MonitorInner>,
}

impl SignalMonitor {
    /// Create a monitor that is not yet attached to any stream
    pub fn new(markers: SignalMarkers) -> Self {
        Self {
            inner: Arc::new(MonitorInner {
                markers,
                state: Mutex::new(MonitorState::default()),
            }),
        }
    }

    /// Markers in use
    pub fn markers(&self) -> &SignalMarkers {
        &self.inner.markers
    }

    /// Queue a one-shot waiter for the next unclaimed signal
    pub fn register(&self) -> PendingSignal {
        let (tx, rx) = oneshot::channel();
        let mut state = self.inner.state.lock();
        let id = state.next_id;
        state.next_id += 1;

        // A closed monitor drops the sender right away so `wait` fails fast
        if !state.closed {
            state.waiters.push_back(Waiter { id, tx });
        }

        PendingSignal {
            id,
            rx,
            monitor: self.clone(),
        }
    }

    /// Number of waiters still queued
    pub fn pending(&self) -> usize {
        self.inner.state.lock().waiters.len()
    }

    /// Whether the watched stream has ended
    pub fn is_closed(&self) -> bool {
        self.inner.state.lock().closed
    }

    /// Scan `stream` line by line until EOF, then close the monitor
    pub fn attach<R>(&self, stream: R) -> JoinHandle<()>
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let monitor = self.clone();
        tokio::spawn(async move {
            let mut reader = BufReader::new(stream);
            let mut buf = Vec::new();
            loop {
                buf.clear();
                match reader.read_until(b'\n', &mut buf).await {
                    Ok(0) => break,
                    Ok(_) => {
                        let line = String::from_utf8_lossy(&buf);
                        monitor.observe_line(line.trim_end_matches(['\r', '\n']));
                    }
                    Err(e) => {
                        warn!(error = %e, "Failed to read bundler output");
                        break;
                    }
                }
            }
            monitor.close();
        })
    }

    /// Feed one line of bundler output
    pub fn observe_line(&self, line: &str) {
        let markers = &self.inner.markers;

        if line.contains(markers.finished()) {
            info!("Bundler compilation finished");
            let diagnostics = self.take_diagnostics();
            self.dispatch(CompletionSignal::Finished { diagnostics });
        } else if line.contains(markers.failed()) {
            warn!("Bundler compilation failed");
            let diagnostics = self.take_diagnostics();
            self.dispatch(CompletionSignal::Failed { diagnostics });
        } else if markers.is_diagnostic(line) {
            debug!(target: "warmpack::bundler", "{}", line);
            let mut state = self.inner.state.lock();
            if state.diagnostics.len() < MAX_DIAGNOSTICS_PER_SIGNAL {
                state.diagnostics.push(line.to_string());
            } else {
                state.dropped_diagnostics += 1;
            }
        } else {
            debug!(target: "warmpack::bundler", "{}", line);
        }
    }

    fn take_diagnostics(&self) -> Vec<String> {
        let mut state = self.inner.state.lock();
        let dropped = std::mem::take(&mut state.dropped_diagnostics);
        if dropped > 0 {
            warn!(dropped, kept = state.diagnostics.len(), "Too many diagnostics, extra lines dropped");
        }
        std::mem::take(&mut state.diagnostics)
    }

    fn dispatch(&self, signal: CompletionSignal) {
        let waiter = self.inner.state.lock().waiters.pop_front();
        match waiter {
            Some(waiter) => {
                if waiter.tx.send(signal).is_err() {
                    debug!(build_id = waiter.id, "Build stopped waiting, signal consumed");
                }
            }
            None => warn!(?signal, "Completion signal with no pending build, dropping"),
        }
    }

    fn close(&self) {
        let mut state = self.inner.state.lock();
        state.closed = true;
        let abandoned = state.waiters.len();
        state.waiters.clear();
        if abandoned > 0 {
            warn!(abandoned, "Bundler output closed with builds still waiting");
        } else {
            debug!("Bundler output closed");
        }
    }

    fn withdraw(&self, id: u64) {
        self.inner.state.lock().waiters.retain(|w| w.id != id);
    }
}

/// A build's claim on the next completion signal
pub struct PendingSignal {
    id: u64,
    rx: oneshot::Receiver<CompletionSignal>,
    monitor: SignalMonitor,
}

impl PendingSignal {
    /// Registration order of this waiter
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Wait for the signal.
    ///
    /// Dropping the future leaves the slot queued, so the compile this build
    /// started still consumes its own signal.
    pub async fn wait(self) -> Result<CompletionSignal> {
        self.rx.await.map_err(|_| ProcessError::OutputClosed)
    }

    /// Give up the slot entirely, used when no compile was started for it
    pub fn abandon(self) {
        self.monitor.withdraw(self.id);
    }
}

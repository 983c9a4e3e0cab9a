//! Persistent worker request loop
//!
//! Speaks the executor's newline-delimited JSON worker protocol: one
//! `WorkRequest` object per input line, one `WorkResponse` object per
//! output line. Multiplex requests run concurrently as tasks and are
//! answered as they finish; singleplex requests run in arrival order. A
//! `cancel` request aborts the matching one.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::task::{AbortHandle, JoinError, JoinSet};
use tracing::{debug, error, info, warn};

use crate::error::{Result, WorkerError};

/// Callback invoked once per request
#[async_trait]
pub trait WorkHandler: Send + Sync + 'static {
    /// Run the request; `Ok(false)` is a failed but orderly build
    async fn handle(&self, arguments: Vec<String>) -> Result<bool>;
}

/// Input file digest entry of a request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkInput {
    /// Path of the input file
    #[serde(default)]
    pub path: String,
    /// Content digest, opaque to the worker
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
}

/// One request from the executor
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WorkRequest {
    /// Action arguments
    pub arguments: Vec<String>,
    /// Action inputs
    pub inputs: Vec<WorkInput>,
    /// 0 for singleplex workers
    pub request_id: i32,
    /// Cancel the in-flight request with the same id
    pub cancel: bool,
    /// Executor verbosity hint
    pub verbosity: i32,
    /// Sandbox root, if sandboxed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sandbox_dir: Option<String>,
}

/// One response to the executor
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WorkResponse {
    /// 0 on success
    pub exit_code: i32,
    /// Text shown to the user for this action
    pub output: String,
    /// Id of the answered request
    pub request_id: i32,
    /// Set when answering a cancel request
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub was_cancelled: bool,
}

impl WorkResponse {
    /// Map a handler result to a response
    pub fn from_result(request_id: i32, mnemonic: &str, result: Result<bool>) -> Self {
        match result {
            Ok(true) => Self {
                request_id,
                ..Self::default()
            },
            Ok(false) => Self {
                exit_code: 1,
                output: format!(
                    "{} build did not succeed: it reported diagnostics or was superseded by a newer request",
                    mnemonic
                ),
                request_id,
                was_cancelled: false,
            },
            Err(e) => Self {
                exit_code: 1,
                output: e.to_string(),
                request_id,
                was_cancelled: false,
            },
        }
    }

    /// Acknowledge a cancel request
    pub fn cancelled(request_id: i32) -> Self {
        Self {
            request_id,
            was_cancelled: true,
            ..Self::default()
        }
    }
}

/// Request id used by singleplex executors
pub const SINGLEPLEX_REQUEST_ID: i32 = 0;

/// Reads requests from `reader`, writes responses to `writer`
pub struct WorkerLoop<R, W> {
    reader: R,
    /// Bytes of the line being read, kept across cancelled reads
    buf: Vec<u8>,
    writer: W,
    mnemonic: String,
}

impl<R, W> WorkerLoop<R, W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    /// Create a loop over the given streams
    pub fn new(reader: R, writer: W, mnemonic: impl Into<String>) -> Self {
        Self {
            reader,
            buf: Vec::new(),
            writer,
            mnemonic: mnemonic.into(),
        }
    }

    /// Serve requests until input closes and in-flight work has drained.
    ///
    /// Singleplex requests (id 0) run one after another; multiplex requests
    /// run concurrently. Every request is answered exactly once.
    pub async fn run<H: WorkHandler>(&mut self, handler: Arc<H>) -> Result<()> {
        info!(mnemonic = %self.mnemonic, "Running {} as a persistent worker", self.mnemonic);

        let mut scheduler = Scheduler::new(handler);
        let mut input_open = true;

        loop {
            tokio::select! {
                read = self.reader.read_until(b'\n', &mut self.buf), if input_open => {
                    match read {
                        Ok(0) if self.buf.is_empty() => {
                            debug!("Worker input closed");
                            input_open = false;
                            continue;
                        }
                        Ok(_) => {}
                        Err(e) => {
                            error!(error = %e, "Failed to read worker input, draining in-flight requests");
                            input_open = false;
                            continue;
                        }
                    }

                    let raw = std::mem::take(&mut self.buf);
                    let Some(request) = decode_line(raw).as_deref().and_then(parse_request) else {
                        continue;
                    };

                    let request_id = request.request_id;
                    if request.cancel {
                        let cancelled = scheduler.cancel(request_id);
                        if cancelled == 0 {
                            debug!(request_id, "Cancel for unknown or finished request");
                        }
                        for _ in 0..cancelled {
                            self.write_response(&WorkResponse::cancelled(request_id)).await?;
                        }
                        continue;
                    }

                    debug!(request_id, arguments = request.arguments.len(), "Work request received");
                    scheduler.submit(request);
                }
                Some(joined) = scheduler.tasks.join_next(), if !scheduler.tasks.is_empty() => {
                    let Some((request_id, result)) = scheduler.finish(joined)? else {
                        continue;
                    };
                    if let Err(e) = &result {
                        error!(request_id, error = %e, "Work request failed");
                    }
                    let response = WorkResponse::from_result(request_id, &self.mnemonic, result);
                    self.write_response(&response).await?;
                }
                else => break,
            }
        }

        Ok(())
    }

    /// Give back the output stream
    pub fn into_writer(self) -> W {
        self.writer
    }

    async fn write_response(&mut self, response: &WorkResponse) -> Result<()> {
        let mut json = serde_json::to_string(response)
            .map_err(|e| WorkerError::Protocol(format!("Failed to serialize response: {}", e)))?;
        json.push('\n');

        self.writer.write_all(json.as_bytes()).await?;
        self.writer.flush().await?;
        Ok(())
    }
}

/// Tracks running and queued requests by an internal task id, so requests
/// sharing a request id are still answered one by one
struct Scheduler<H> {
    handler: Arc<H>,
    tasks: JoinSet<(u64, Result<bool>)>,
    running: HashMap<u64, (i32, AbortHandle)>,
    /// Singleplex requests waiting for the current one to finish
    queued: VecDeque<(u64, Vec<String>)>,
    singleplex_busy: bool,
    next_task: u64,
}

impl<H: WorkHandler> Scheduler<H> {
    fn new(handler: Arc<H>) -> Self {
        Self {
            handler,
            tasks: JoinSet::new(),
            running: HashMap::new(),
            queued: VecDeque::new(),
            singleplex_busy: false,
            next_task: 0,
        }
    }

    fn submit(&mut self, request: WorkRequest) {
        let task = self.next_task;
        self.next_task += 1;

        if request.request_id == SINGLEPLEX_REQUEST_ID {
            if self.singleplex_busy {
                debug!(queued = self.queued.len() + 1, "Singleplex request queued");
                self.queued.push_back((task, request.arguments));
                return;
            }
            self.singleplex_busy = true;
        } else if self.running.values().any(|(id, _)| *id == request.request_id) {
            warn!(request_id = request.request_id, "Duplicate request id in flight");
        }

        self.spawn(task, request.request_id, request.arguments);
    }

    fn spawn(&mut self, task: u64, request_id: i32, arguments: Vec<String>) {
        let handler = self.handler.clone();
        let abort = self
            .tasks
            .spawn(async move { (task, handler.handle(arguments).await) });
        self.running.insert(task, (request_id, abort));
    }

    /// Abort running and queued requests with `request_id`, returning how
    /// many were dropped
    fn cancel(&mut self, request_id: i32) -> usize {
        let tasks: Vec<u64> = self
            .running
            .iter()
            .filter(|(_, (id, _))| *id == request_id)
            .map(|(task, _)| *task)
            .collect();

        for task in &tasks {
            if let Some((_, abort)) = self.running.remove(task) {
                info!(request_id, "Cancelling in-flight request");
                abort.abort();
            }
        }

        let mut cancelled = tasks.len();
        if request_id == SINGLEPLEX_REQUEST_ID {
            cancelled += self.queued.len();
            self.queued.clear();
            self.singleplex_busy = false;
        }
        cancelled
    }

    /// Settle a joined task, returning the response still owed for it
    fn finish(
        &mut self,
        joined: std::result::Result<(u64, Result<bool>), JoinError>,
    ) -> Result<Option<(i32, Result<bool>)>> {
        match joined {
            Ok((task, result)) => {
                // Already answered when it was cancelled
                let Some((request_id, _)) = self.running.remove(&task) else {
                    return Ok(None);
                };
                if request_id == SINGLEPLEX_REQUEST_ID {
                    self.start_next_singleplex();
                }
                Ok(Some((request_id, result)))
            }
            Err(e) if e.is_cancelled() => Ok(None),
            Err(e) => Err(WorkerError::Protocol(format!("request task panicked: {}", e))),
        }
    }

    fn start_next_singleplex(&mut self) {
        match self.queued.pop_front() {
            Some((task, arguments)) => self.spawn(task, SINGLEPLEX_REQUEST_ID, arguments),
            None => self.singleplex_busy = false,
        }
    }
}

fn decode_line(raw: Vec<u8>) -> Option<String> {
    match String::from_utf8(raw) {
        Ok(line) => Some(line),
        Err(e) => {
            error!(error = %e, "Skipping work request that is not valid UTF-8");
            None
        }
    }
}

fn parse_request(line: &str) -> Option<WorkRequest> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    match serde_json::from_str(line) {
        Ok(request) => Some(request),
        Err(e) => {
            error!(error = %e, "Skipping malformed work request");
            None
        }
    }
}

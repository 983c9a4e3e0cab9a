//! Binds the orchestrator to a persistent request loop or a single
//! standalone build

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite, BufReader};
use tracing::{info, warn};

use crate::{
    error::{Result, WorkerError},
    orchestrator::BuildOrchestrator,
    protocol::WorkerLoop,
};

/// Marker for an argument file given in place of literal arguments
pub const ARGS_FILE_PREFIX: char = '@';

/// How this process serves builds
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerMode {
    /// Serve requests until the executor closes stdin
    Persistent,
    /// Run the build described by one argument file, then exit
    Standalone {
        /// Argument file path, `@` marker already stripped
        args_file: PathBuf,
    },
}

impl WorkerMode {
    /// Pick the mode from the persistent flag and the positional arguments
    pub fn select(persistent: bool, args: &[String]) -> Result<Self> {
        if persistent {
            return Ok(WorkerMode::Persistent);
        }

        args.last()
            .map(|last| WorkerMode::Standalone {
                args_file: args_file_path(last),
            })
            .ok_or_else(|| {
                WorkerError::InvalidRequest(
                    "expected an argument file (`@<path>`) or --persistent_worker".to_string(),
                )
            })
    }
}

/// Strip the `@` argument-file marker, if present
pub fn args_file_path(arg: &str) -> PathBuf {
    PathBuf::from(arg.strip_prefix(ARGS_FILE_PREFIX).unwrap_or(arg))
}

/// Read one argument per line.
///
/// A trailing newline does not add an empty argument; empty lines inside
/// the file are kept since they are positional.
pub async fn read_args_file(path: &Path) -> Result<Vec<String>> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| WorkerError::ArgsFile {
            path: path.to_path_buf(),
            source,
        })?;

    Ok(content.lines().map(str::to_string).collect())
}

/// Run one build from an argument file and close the compiler process,
/// whatever the outcome
pub async fn run_standalone(
    orchestrator: &BuildOrchestrator,
    mnemonic: &str,
    args_file: &Path,
) -> Result<bool> {
    info!(mnemonic, "Running {} as a standalone process", mnemonic);
    warn!(
        "Started a new process to perform this action. Your build might be misconfigured, try --strategy={}=worker",
        mnemonic
    );

    let result = match read_args_file(args_file).await {
        Ok(args) => orchestrator.emit_once(args).await,
        Err(e) => Err(e),
    };

    if let Err(e) = orchestrator.shutdown().await {
        warn!(error = %e, "Failed to close compiler process");
    }

    result
}

/// Serve requests from `reader` until it closes, answering on `writer`
pub async fn run_persistent<R, W>(
    orchestrator: Arc<BuildOrchestrator>,
    mnemonic: &str,
    reader: R,
    writer: W,
) -> Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut worker = WorkerLoop::new(BufReader::new(reader), writer, mnemonic);
    let result = worker.run(orchestrator.clone()).await;

    if let Err(e) = orchestrator.shutdown().await {
        warn!(error = %e, "Failed to close compiler process");
    }

    result
}

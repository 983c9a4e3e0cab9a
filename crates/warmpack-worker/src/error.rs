//! Error types for build orchestration

use std::io;
use std::path::PathBuf;

use thiserror::Error;
use warmpack_process::ProcessError;

/// Errors surfaced by a build or by the worker loop
#[derive(Debug, Error)]
pub enum WorkerError {
    /// Compiler process failure (spawn, output closed, shutdown)
    #[error(transparent)]
    Process(#[from] ProcessError),

    /// The bundler reported a failed compilation
    #[error("Bundler compilation has failed{}", format_diagnostics(.diagnostics))]
    CompilationFailed { diagnostics: Vec<String> },

    /// No completion signal before the build deadline
    #[error("Build did not complete within {seconds}s")]
    BuildTimeout { seconds: u64 },

    /// Request arguments missing required entries
    #[error("Invalid build request: {0}")]
    InvalidRequest(String),

    /// Argument file could not be read
    #[error("Failed to read argument file {}: {source}", .path.display())]
    ArgsFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Settings could not be loaded or are invalid
    #[error("Configuration error: {0}")]
    Config(String),

    /// Worker protocol failure
    #[error("Worker protocol error: {0}")]
    Protocol(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

fn format_diagnostics(diagnostics: &[String]) -> String {
    if diagnostics.is_empty() {
        String::new()
    } else {
        format!(":\n{}", diagnostics.join("\n"))
    }
}

/// Result type for worker operations
pub type Result<T> = std::result::Result<T, WorkerError>;

//! Error types for compiler process management

use std::io;
use thiserror::Error;

/// Compiler process errors
#[derive(Debug, Error)]
pub enum ProcessError {
    /// Failed to spawn the bundler
    #[error("Failed to spawn `{command}`: {source}")]
    SpawnFailed {
        command: String,
        #[source]
        source: io::Error,
    },

    /// A later request asked for a different launch command
    #[error("Compiler process already running as `{running}`, refusing `{requested}`")]
    CommandMismatch { running: String, requested: String },

    /// The bundler output stream ended, no further signals will arrive
    #[error("Compiler process output closed before a completion signal arrived")]
    OutputClosed,

    /// Process did not exit in time
    #[error("Compiler process did not exit within {seconds}s")]
    Timeout { seconds: u64 },

    /// Failed to kill process
    #[error("Failed to kill compiler process: {0}")]
    KillFailed(String),

    /// Invalid signal markers or patterns
    #[error("Invalid process configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for process operations
pub type Result<T> = std::result::Result<T, ProcessError>;

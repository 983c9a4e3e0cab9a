// CLI error types

use thiserror::Error;
use warmpack_worker::WorkerError;

/// CLI-specific errors
#[derive(Error, Debug)]
pub enum CliError {
    #[error(transparent)]
    Worker(#[from] WorkerError),

    #[error("Logging error: {0}")]
    Logging(String),
}

impl CliError {
    /// Get a user-friendly error message with hints
    pub fn user_message(&self) -> String {
        match self {
            CliError::Worker(WorkerError::InvalidRequest(msg)) => {
                format!(
                    "Invalid request: {}\n\nRun 'warmpack --help' for usage information.",
                    msg
                )
            }
            CliError::Worker(WorkerError::Config(msg)) => {
                format!(
                    "Configuration error: {}\n\nCheck the file passed with --settings.",
                    msg
                )
            }
            CliError::Worker(e) => e.to_string(),
            CliError::Logging(msg) => format!("Failed to initialize logging: {}", msg),
        }
    }
}

/// Result type for CLI operations
pub type CliResult<T> = Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_message_hints() {
        let err = CliError::from(WorkerError::InvalidRequest("missing bundler".to_string()));
        assert!(err.user_message().contains("warmpack --help"));

        let err = CliError::from(WorkerError::Config("bad marker".to_string()));
        assert!(err.user_message().contains("--settings"));

        let err = CliError::from(WorkerError::BuildTimeout { seconds: 3 });
        assert_eq!(err.user_message(), err.to_string());
    }
}

//! Worker settings loaded from YAML

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use warmpack_process::{
    monitor::{DEFAULT_DIAGNOSTIC_PATTERN, DEFAULT_FAILED_MARKER, DEFAULT_FINISHED_MARKER},
    CommandPolicy, SignalMarkers,
};

use crate::error::{Result, WorkerError};

/// Settings for one worker process. Every field has a default, so an
/// empty file is valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerSettings {
    /// Action label used in log lines (e.g. "Webpack")
    pub mnemonic: String,
    /// Sentinel announcing a finished compile
    pub finished_marker: String,
    /// Sentinel announcing a failed compile
    pub failed_marker: String,
    /// Regexes for output lines counted as diagnostics
    pub diagnostic_patterns: Vec<String>,
    /// Build deadline in seconds (0 = wait forever)
    pub build_timeout_secs: u64,
    /// Grace period before the bundler is killed on shutdown
    pub shutdown_timeout_secs: u64,
    /// What to do when launch arguments change after the first build
    pub command_policy: CommandPolicy,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            mnemonic: "Webpack".to_string(),
            finished_marker: DEFAULT_FINISHED_MARKER.to_string(),
            failed_marker: DEFAULT_FAILED_MARKER.to_string(),
            diagnostic_patterns: vec![DEFAULT_DIAGNOSTIC_PATTERN.to_string()],
            build_timeout_secs: 1800,
            shutdown_timeout_secs: 5,
            command_policy: CommandPolicy::Ignore,
        }
    }
}

impl WorkerSettings {
    /// Load settings from a YAML file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        debug!("Loading worker settings from: {:?}", path);

        let content = std::fs::read_to_string(path).map_err(|e| {
            WorkerError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;

        Self::load_from_str(&content)
    }

    /// Load settings from a YAML string
    pub fn load_from_str(content: &str) -> Result<Self> {
        let settings: WorkerSettings = if content.trim().is_empty() {
            WorkerSettings::default()
        } else {
            serde_yaml::from_str(content)
                .map_err(|e| WorkerError::Config(format!("Failed to parse YAML: {}", e)))?
        };

        settings.validate()?;
        info!(mnemonic = %settings.mnemonic, "Loaded worker settings");

        Ok(settings)
    }

    /// Check values the serde layer cannot
    pub fn validate(&self) -> Result<()> {
        if self.mnemonic.trim().is_empty() {
            return Err(WorkerError::Config("mnemonic must not be empty".to_string()));
        }
        if self.shutdown_timeout_secs == 0 {
            return Err(WorkerError::Config(
                "shutdown_timeout_secs must be greater than 0".to_string(),
            ));
        }
        self.markers().map(|_| ())
    }

    /// Compile the markers for the signal monitor
    pub fn markers(&self) -> Result<SignalMarkers> {
        SignalMarkers::new(
            self.finished_marker.clone(),
            self.failed_marker.clone(),
            &self.diagnostic_patterns,
        )
        .map_err(|e| WorkerError::Config(e.to_string()))
    }

    /// Build deadline, `None` when unbounded
    pub fn build_timeout(&self) -> Option<Duration> {
        (self.build_timeout_secs > 0).then(|| Duration::from_secs(self.build_timeout_secs))
    }

    /// Shutdown grace period
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

//! Shared helpers for worker integration tests

#![allow(dead_code)]

use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use warmpack_worker::{BuildOrchestrator, WorkerSettings};

pub use warmpack_process::monitor::{DEFAULT_FAILED_MARKER as FAILED, DEFAULT_FINISHED_MARKER as FINISHED};

/// Executable shell script standing in for the bundler CLI.
///
/// The script records its arguments in `argv.txt` next to itself, runs
/// `body`, then idles like a watch-mode bundler.
pub fn fake_bundler(dir: &TempDir, body: &str) -> PathBuf {
    let path = dir.path().join("bundler.sh");
    let argv = dir.path().join("argv.txt");
    let script = format!(
        "#!/bin/sh\necho \"$@\" > '{}'\n{}\nexec sleep 30\n",
        argv.display(),
        body
    );
    std::fs::write(&path, script).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// Arguments the fake bundler was launched with
pub fn recorded_argv(dir: &TempDir) -> String {
    std::fs::read_to_string(dir.path().join("argv.txt"))
        .unwrap()
        .trim_end()
        .to_string()
}

/// Orchestrator with default markers and a short deadline
pub fn orchestrator() -> Arc<BuildOrchestrator> {
    let settings = WorkerSettings {
        build_timeout_secs: 10,
        shutdown_timeout_secs: 2,
        ..WorkerSettings::default()
    };
    Arc::new(BuildOrchestrator::from_settings(&settings).unwrap())
}

/// Give a just-closed process a moment to be reaped
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(100)).await;
}

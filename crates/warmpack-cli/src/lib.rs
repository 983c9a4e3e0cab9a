//! warmpack command line entry point
//!
//! Wires settings, logging and the build orchestrator to the two ways an
//! executor can start the worker: as a persistent worker speaking JSON on
//! stdin/stdout, or as a one-shot process given an `@argument` file.

pub mod cli;
pub mod error;
pub mod logging;

use std::path::Path;
use std::sync::Arc;

use tracing::debug;
use warmpack_worker::{run_persistent, run_standalone, BuildOrchestrator, WorkerMode, WorkerSettings};

pub use cli::Cli;
pub use error::{CliError, CliResult};

/// Settings from the given file, or the defaults
pub fn load_settings(path: Option<&Path>) -> CliResult<WorkerSettings> {
    match path {
        Some(path) => Ok(WorkerSettings::load_from_file(path)?),
        None => {
            debug!("No settings file given, using defaults");
            Ok(WorkerSettings::default())
        }
    }
}

/// Run the worker in the mode the command line selects.
///
/// Returns `false` when a standalone build did not succeed.
pub async fn run(cli: &Cli) -> CliResult<bool> {
    let settings = load_settings(cli.settings.as_deref())?;
    let mode = WorkerMode::select(cli.persistent_worker, &cli.args)?;
    let orchestrator = Arc::new(BuildOrchestrator::from_settings(&settings)?);

    match mode {
        WorkerMode::Persistent => {
            run_persistent(
                orchestrator,
                &settings.mnemonic,
                tokio::io::stdin(),
                tokio::io::stdout(),
            )
            .await?;
            Ok(true)
        }
        WorkerMode::Standalone { args_file } => {
            Ok(run_standalone(&orchestrator, &settings.mnemonic, &args_file).await?)
        }
    }
}

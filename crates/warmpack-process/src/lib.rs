//! # warmpack-process
//!
//! **Purpose**: Lifecycle of the single warm bundler process
//!
//! Builds the bundler command line, spawns the process once, and watches
//! its output for the sentinel lines that mark a compile as finished or
//! failed.
//!
//! ## Features
//!
//! - **Command Composition**: `--config <base>`, optional `--config <user> --merge`, extra args
//! - **Create-Once Supervision**: one process per host, shared by every build
//! - **Signal Monitoring**: per-build one-shot waiters answered in request order
//! - **Graceful Shutdown**: SIGTERM, bounded wait, then SIGKILL
//!
//! ## Usage
//!
//! ```rust,no_run
//! use warmpack_process::{build_command, ProcessSupervisor, SignalMarkers, SignalMonitor};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let monitor = SignalMonitor::new(SignalMarkers::default());
//! let supervisor = ProcessSupervisor::new(monitor.clone());
//!
//! // Claim the next signal before the process can emit it
//! let pending = monitor.register();
//! let command = build_command("webpack-cli", "webpack.config.js", Some("user.config.js"), &[]);
//! supervisor.get_or_create(&command).await?;
//!
//! let signal = pending.wait().await?;
//! println!("{:?}", signal);
//!
//! supervisor.shutdown().await?;
//! # Ok(())
//! # }
//! ```

pub mod child;
pub mod command;
pub mod error;
pub mod monitor;
pub mod supervisor;

pub use child::CompilerProcess;
pub use command::{build_command, CommandPolicy, LaunchCommand};
pub use error::{ProcessError, Result};
pub use monitor::{CompletionSignal, PendingSignal, SignalMarkers, SignalMonitor};
pub use supervisor::ProcessSupervisor;

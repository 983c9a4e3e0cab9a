//! Build orchestration for a warm bundler process
//!
//! Lets a build executor reuse one long-lived bundler (webpack in watch
//! mode) across many builds instead of starting it for every action.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  Dispatch                                                    │
//! │  persistent: WorkerLoop (JSON lines on stdin/stdout)         │
//! │  standalone: one @argument-file build, then close            │
//! └──────────────────────────────┬───────────────────────────────┘
//!                                │ arguments
//! ┌──────────────────────────────▼───────────────────────────────┐
//! │  BuildOrchestrator                                           │
//! │  - CancellationGuard: newest request wins                    │
//! │  - one-shot signal claim per build                           │
//! │  - build deadline                                            │
//! └───────────────┬──────────────────────────────▲───────────────┘
//!                 │ get_or_create                │ CompletionSignal
//! ┌───────────────▼──────────────┐   ┌───────────┴───────────────┐
//! │  ProcessSupervisor           │   │  SignalMonitor            │
//! │  (warmpack-process)          ├──►│  sentinel lines on stdout │
//! └──────────────────────────────┘   └───────────────────────────┘
//! ```
//!
//! # Module Organization
//!
//! - `cancellation`: request stamping and staleness
//! - `config`: worker settings
//! - `dispatch`: persistent and standalone entry points
//! - `error`: error types and result types
//! - `orchestrator`: per-build state machine
//! - `protocol`: worker request loop
//! - `request`: build request arguments

pub mod cancellation;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod orchestrator;
pub mod protocol;
pub mod request;

pub use cancellation::{CancellationGuard, CancellationToken};
pub use config::WorkerSettings;
pub use dispatch::{args_file_path, read_args_file, run_persistent, run_standalone, WorkerMode};
pub use error::{Result, WorkerError};
pub use orchestrator::{BuildOrchestrator, BuildOutcome};
pub use protocol::{WorkHandler, WorkInput, WorkRequest, WorkResponse, WorkerLoop};
pub use request::BuildRequest;

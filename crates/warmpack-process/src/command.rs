//! Bundler launch command composition

use std::fmt;

use serde::{Deserialize, Serialize};

/// Flag selecting a configuration file
pub const CONFIG_FLAG: &str = "--config";
/// Modifier telling the bundler to merge the preceding config into the base one
pub const MERGE_FLAG: &str = "--merge";

/// Program and arguments used to launch the bundler
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchCommand {
    /// Executable path
    pub program: String,
    /// Arguments, passed to the OS one per item
    pub args: Vec<String>,
}

impl LaunchCommand {
    /// Create a command with no arguments
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: vec![],
        }
    }

    /// Append one argument
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append arguments in order
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }
}

impl fmt::Display for LaunchCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Builds the bundler command line.
///
/// Order is fixed: the base config first, then the user config with
/// `--merge` (so it augments the base instead of replacing it), then
/// `extra_args` verbatim. Contents are not validated; a bad path shows up
/// later as a spawn or compilation failure.
///
/// # Examples
/// ```
/// use warmpack_process::build_command;
///
/// let command = build_command("webpack-cli", "base.json", Some("user.json"), &["--stats".to_string()]);
/// assert_eq!(
///     command.to_string(),
///     "webpack-cli --config base.json --config user.json --merge --stats"
/// );
/// ```
pub fn build_command(
    program: &str,
    base_config: &str,
    user_config: Option<&str>,
    extra_args: &[String],
) -> LaunchCommand {
    let mut command = LaunchCommand::new(program).arg(CONFIG_FLAG).arg(base_config);

    if let Some(user_config) = user_config {
        command = command.arg(CONFIG_FLAG).arg(user_config).arg(MERGE_FLAG);
    }

    command.args(extra_args.iter().cloned())
}

/// What to do when a request asks for a different command than the one the
/// running process was launched with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandPolicy {
    /// Keep the warm process and log a warning
    #[default]
    Ignore,
    /// Fail the request with [`ProcessError::CommandMismatch`](crate::ProcessError::CommandMismatch)
    Reject,
}

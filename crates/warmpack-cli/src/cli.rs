// Command line surface

use std::path::PathBuf;

use clap::Parser;

/// Keeps one bundler process warm and serves builds through it
#[derive(Parser, Debug)]
#[command(name = "warmpack")]
#[command(bin_name = "warmpack")]
#[command(version)]
#[command(about = "Persistent build worker for a warm bundler process")]
#[command(
    long_about = "Persistent build worker for a warm bundler process.\n\nWith --persistent_worker, serves JSON work requests on stdin until it closes.\nOtherwise runs the single build described by the trailing @argument file."
)]
pub struct Cli {
    /// Serve work requests from stdin until it closes
    #[arg(long = "persistent_worker")]
    pub persistent_worker: bool,

    /// Worker settings file (YAML)
    #[arg(long, value_name = "PATH", env = "WARMPACK_SETTINGS")]
    pub settings: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(long, value_name = "LEVEL", default_value = "info", env = "WARMPACK_LOG")]
    pub log_level: String,

    /// Include targets, thread ids and source locations in log lines
    #[arg(long)]
    pub debug: bool,

    /// Remaining arguments; the last one is the @argument file in standalone mode
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, value_name = "ARGS")]
    pub args: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_persistent_flag() {
        let cli = Cli::try_parse_from(["warmpack", "--persistent_worker"]).unwrap();
        assert!(cli.persistent_worker);
        assert!(cli.args.is_empty());
    }

    #[test]
    fn test_standalone_args_file() {
        let cli = Cli::try_parse_from([
            "warmpack",
            "--log-level",
            "debug",
            "@bazel-out/bundle.params",
        ])
        .unwrap();

        assert!(!cli.persistent_worker);
        assert_eq!(cli.log_level, "debug");
        assert_eq!(cli.args, vec!["@bazel-out/bundle.params"]);
    }

    #[test]
    fn test_trailing_args_keep_hyphen_values() {
        let cli = Cli::try_parse_from([
            "warmpack",
            "--settings",
            "worker.yaml",
            "node_modules/.bin/webpack-cli",
            "--stats",
            "@args.params",
        ])
        .unwrap();

        assert_eq!(cli.settings, Some(PathBuf::from("worker.yaml")));
        assert_eq!(
            cli.args,
            vec!["node_modules/.bin/webpack-cli", "--stats", "@args.params"]
        );
    }

    #[test]
    fn test_cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}

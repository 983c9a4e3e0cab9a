//! Build request arguments

use warmpack_process::{build_command, LaunchCommand};

use crate::error::{Result, WorkerError};

/// Positional arguments of one build, as written by the build rule:
/// `[bundler_cli, base_config, user_config, extra_args...]`.
///
/// Contents are not validated: a bad or empty path surfaces later as a
/// spawn or compilation failure. An empty `user_config` means no override.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildRequest {
    bundler: String,
    base_config: String,
    user_config: Option<String>,
    extra_args: Vec<String>,
}

impl BuildRequest {
    /// Parse request arguments
    pub fn from_args<I, S>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut args = args.into_iter().map(Into::into);

        let bundler = args
            .next()
            .ok_or_else(|| WorkerError::InvalidRequest("missing bundler executable".to_string()))?;
        let base_config = args.next().ok_or_else(|| {
            WorkerError::InvalidRequest("missing base configuration path".to_string())
        })?;
        let user_config = args.next().filter(|a| !a.is_empty());
        let extra_args = args.collect();

        Ok(Self {
            bundler,
            base_config,
            user_config,
            extra_args,
        })
    }

    /// Bundler executable
    pub fn bundler(&self) -> &str {
        &self.bundler
    }

    /// Base configuration path
    pub fn base_config(&self) -> &str {
        &self.base_config
    }

    /// User configuration merged over the base, if any
    pub fn user_config(&self) -> Option<&str> {
        self.user_config.as_deref()
    }

    /// Extra bundler arguments
    pub fn extra_args(&self) -> &[String] {
        &self.extra_args
    }

    /// Launch command for this request
    pub fn command(&self) -> LaunchCommand {
        build_command(
            &self.bundler,
            &self.base_config,
            self.user_config(),
            &self.extra_args,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_request() {
        let request = BuildRequest::from_args([
            "node_modules/.bin/webpack-cli",
            "bazel.webpack.config.js",
            "webpack.config.js",
            "--stats",
            "--profile",
        ])
        .unwrap();

        assert_eq!(request.bundler(), "node_modules/.bin/webpack-cli");
        assert_eq!(request.user_config(), Some("webpack.config.js"));
        assert_eq!(request.extra_args(), ["--stats".to_string(), "--profile".to_string()]);
        assert_eq!(
            request.command().to_string(),
            "node_modules/.bin/webpack-cli --config bazel.webpack.config.js \
             --config webpack.config.js --merge --stats --profile"
        );
    }

    #[test]
    fn test_empty_user_config_means_none() {
        let request = BuildRequest::from_args(["webpack", "base.js", ""]).unwrap();
        assert_eq!(request.user_config(), None);
        assert!(request.extra_args().is_empty());
        assert_eq!(request.command().args, vec!["--config", "base.js"]);
    }

    #[test]
    fn test_empty_entries_pass_through_verbatim() {
        let request = BuildRequest::from_args(["cfg.json", "", "user.json", "--verbose", ""]).unwrap();

        assert_eq!(request.bundler(), "cfg.json");
        assert_eq!(request.base_config(), "");
        assert_eq!(request.user_config(), Some("user.json"));
        assert_eq!(request.extra_args(), ["--verbose".to_string(), String::new()]);
        assert_eq!(
            request.command().args,
            vec!["--config", "", "--config", "user.json", "--merge", "--verbose", ""]
        );
    }

    #[test]
    fn test_too_few_positional_arguments() {
        assert!(matches!(
            BuildRequest::from_args(Vec::<String>::new()),
            Err(WorkerError::InvalidRequest(_))
        ));
        assert!(matches!(
            BuildRequest::from_args(["webpack"]),
            Err(WorkerError::InvalidRequest(_))
        ));
    }
}

// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Configuration for git command execution
//!
//! A [`Config`] is built once and threaded through every constructor that
//! runs git. Global arguments live here rather than in process-wide state.

use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default timeout for one-shot commands
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(360);

/// Environment applied to every git invocation
pub const BASE_ENV: &[(&str, &str)] = &[
    ("LC_ALL", "C"),
    ("GIT_TERMINAL_PROMPT", "0"),
    ("GIT_NO_REPLACE_OBJECTS", "1"),
    ("GIT_CONFIG_NOSYSTEM", "1"),
];

/// Which cat-file protocol variant to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchMode {
    /// Pick `--batch-command` when the installed git supports it
    #[default]
    Auto,
    /// Always use the `--batch` / `--batch-check` pair
    Legacy,
    /// Always use `--batch-command`
    Command,
}

impl FromStr for BatchMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "legacy" => Ok(Self::Legacy),
            "command" => Ok(Self::Command),
            other => Err(ConfigError::UnknownBatchMode(other.to_string())),
        }
    }
}

/// Settings for running git
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Program to execute
    pub git_program: String,

    /// Arguments inserted before the subcommand of every invocation
    ///
    /// Typically `-c key=value` pairs.
    pub global_args: Vec<String>,

    /// Upper bound on the runtime of a one-shot command
    ///
    /// Long-lived batch conversations are bounded only by their context.
    pub command_timeout: Option<Duration>,

    /// Protocol variant selection
    pub batch_mode: BatchMode,

    /// Extra environment variables, applied after [`BASE_ENV`]
    pub envs: Vec<(String, String)>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            git_program: "git".to_string(),
            global_args: Vec::new(),
            command_timeout: Some(DEFAULT_COMMAND_TIMEOUT),
            batch_mode: BatchMode::Auto,
            envs: Vec::new(),
        }
    }
}

impl Config {
    /// Build a configuration from `GITCAT_*` environment variables
    ///
    /// - `GITCAT_GIT`: git program
    /// - `GITCAT_TIMEOUT_SECS`: one-shot command timeout, `0` disables it
    /// - `GITCAT_BATCH_MODE`: `auto`, `legacy` or `command`
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set to an unparseable value.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env) with a custom variable source
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set to an unparseable value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(program) = lookup("GITCAT_GIT") {
            config.git_program = program;
        }
        if let Some(secs) = lookup("GITCAT_TIMEOUT_SECS") {
            let secs: u64 = secs
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidTimeout(secs.clone()))?;
            config.command_timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }
        if let Some(mode) = lookup("GITCAT_BATCH_MODE") {
            config.batch_mode = mode.parse()?;
        }
        Ok(config)
    }

    /// Append a `-c key=value` global argument
    #[must_use]
    pub fn with_config_value(mut self, key: &str, value: &str) -> Self {
        self.global_args.push("-c".to_string());
        self.global_args.push(format!("{key}={value}"));
        self
    }

    /// Force a protocol variant
    #[must_use]
    pub fn with_batch_mode(mut self, mode: BatchMode) -> Self {
        self.batch_mode = mode;
        self
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The git program is empty
    /// - The command timeout is zero
    /// - A global argument is empty, contains a control character, or
    ///   would change the working directory (`-C`)
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.git_program.trim().is_empty() {
            return Err(ConfigError::EmptyProgram);
        }
        if self.command_timeout == Some(Duration::ZERO) {
            return Err(ConfigError::InvalidTimeout("0s".to_string()));
        }
        for arg in &self.global_args {
            let unsafe_arg = arg.is_empty()
                || arg.chars().any(|c| c == '\n' || c == '\0')
                || arg == "-C"
                || arg.starts_with("--git-dir")
                || arg.starts_with("--work-tree");
            if unsafe_arg {
                return Err(ConfigError::UnsafeGlobalArg(arg.clone()));
            }
        }
        Ok(())
    }
}

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// The git program name was empty
    #[error("git program must not be empty")]
    EmptyProgram,

    /// The timeout could not be parsed or was zero
    #[error("invalid command timeout: {0}")]
    InvalidTimeout(String),

    /// Unknown value for the batch mode
    #[error("unknown batch mode: {0} (expected auto, legacy or command)")]
    UnknownBatchMode(String),

    /// A global argument could break command construction
    #[error("unsafe global argument: {0:?}")]
    UnsafeGlobalArg(String),
}

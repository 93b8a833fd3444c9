// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Git command construction and one-shot execution
//!
//! Arguments come in two flavours. Trusted arguments are `&'static str`
//! literals chosen by this crate. Dynamic arguments may come from callers
//! and are never allowed to start with `-`, so they cannot smuggle in an
//! option. A command with a rejected dynamic argument is marked broken and
//! refuses to run.

use std::io::Read;
use std::path::{Component, Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;

use tracing::{debug, error};

use crate::config::{BASE_ENV, Config};
use crate::context::Context;
use crate::error::{GitError, Result};
use crate::transport::Transport;

/// A git invocation under construction
#[derive(Debug, Clone)]
pub struct GitCommand {
    program: String,
    args: Vec<String>,
    global_len: usize,
    broken: Vec<String>,
    dir: Option<PathBuf>,
    envs: Vec<(String, String)>,
    timeout: Option<Duration>,
}

impl GitCommand {
    /// Start a command with the program, global arguments, environment and
    /// timeout from `config`
    #[must_use]
    pub fn new(config: &Config) -> Self {
        Self {
            program: config.git_program.clone(),
            args: config.global_args.clone(),
            global_len: config.global_args.len(),
            broken: Vec::new(),
            dir: None,
            envs: config.envs.clone(),
            timeout: config.command_timeout,
        }
    }

    /// Append a trusted argument
    #[must_use]
    pub fn arg(mut self, arg: &'static str) -> Self {
        self.args.push(arg.to_string());
        self
    }

    /// Append several trusted arguments
    #[must_use]
    pub fn args(mut self, args: &[&'static str]) -> Self {
        self.args.extend(args.iter().map(|a| (*a).to_string()));
        self
    }

    /// Append a caller-provided value
    ///
    /// A value starting with `-` marks the command broken.
    #[must_use]
    pub fn dynamic_arg(mut self, value: impl Into<String>) -> Self {
        let value = value.into();
        if value.starts_with('-') {
            self.broken.push(value);
        } else {
            self.args.push(value);
        }
        self
    }

    /// Append a trusted option followed by a caller-provided value
    #[must_use]
    pub fn option_value(mut self, option: &'static str, value: impl Into<String>) -> Self {
        if !option.starts_with('-') {
            self.broken.push(option.to_string());
            return self;
        }
        self.args.push(option.to_string());
        self.dynamic_arg(value)
    }

    /// Run in `dir`
    #[must_use]
    pub fn dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.dir = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Override the timeout; `None` leaves the command bounded only by its context
    #[must_use]
    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// The configured timeout
    #[must_use]
    pub fn timeout_limit(&self) -> Option<Duration> {
        self.timeout
    }

    /// Human-readable command line for logs
    ///
    /// Credentials in URLs are redacted, absolute paths are shortened and
    /// global arguments are collapsed to `...global...`.
    #[must_use]
    pub fn log_string(&self) -> String {
        let mut parts = Vec::with_capacity(self.args.len() + 1);
        parts.push(debug_quote(&self.program));
        if self.global_len > 0 {
            parts.push("...global...".to_string());
        }
        for arg in &self.args[self.global_len..] {
            parts.push(debug_quote(&sanitize_arg(arg)));
        }
        parts.join(" ")
    }

    /// Log line identifying the command and the repository it runs in
    #[must_use]
    pub fn description(&self) -> String {
        let repo = self
            .dir
            .as_ref()
            .map_or_else(String::new, |d| sanitize_arg(&d.to_string_lossy()));
        format!("git.Run(repo:{repo}): {}", self.log_string())
    }

    pub(crate) fn to_command(&self) -> Result<Command> {
        if !self.broken.is_empty() {
            error!(
                command = %self.log_string(),
                broken = %self.broken.join(" "),
                "git command is broken"
            );
            return Err(GitError::InvalidArgument {
                arg: self.broken.join(" "),
            });
        }

        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        for (key, value) in BASE_ENV {
            command.env(key, value);
        }
        for (key, value) in &self.envs {
            command.env(key, value);
        }
        if let Some(dir) = &self.dir {
            command.current_dir(dir);
        }
        Ok(command)
    }

    /// Run to completion and return standard output
    ///
    /// # Errors
    ///
    /// - `GitError::InvalidArgument` if the command is broken
    /// - `GitError::CommandFailed` with captured stderr on a non-zero exit
    /// - `GitError::Cancelled` / `GitError::TimedOut` if the context or the
    ///   command timeout stopped it
    pub fn run_std_string(&self, ctx: &Context) -> Result<String> {
        ctx.check()?;
        let mut transport = Transport::spawn(self, ctx)?;
        drop(transport.take_stdin());

        let mut stdout = Vec::new();
        let read_result = match transport.take_stdout() {
            Some(mut out) => out.read_to_end(&mut stdout).map(|_| ()),
            None => Ok(()),
        };
        let exit = transport.wait()?;
        read_result?;

        if !exit.status.success() {
            return Err(GitError::CommandFailed {
                command: self.log_string(),
                status: exit.status.to_string(),
                stderr: exit.stderr.trim_end().to_string(),
            });
        }
        debug!(command = %self.log_string(), bytes = stdout.len(), "git command finished");
        Ok(String::from_utf8_lossy(&stdout).into_owned())
    }
}

fn debug_quote(s: &str) -> String {
    if s.contains([' ', '`', '\'', '"', '\t', '\r', '\n']) {
        format!("{s:?}")
    } else {
        s.to_string()
    }
}

/// Redact URL credentials and shorten absolute paths
#[must_use]
pub fn sanitize_arg(arg: &str) -> String {
    if let Some(scheme_end) = arg.find("://")
        && let Some(at) = arg.rfind('@')
        && at > scheme_end
    {
        let host_start = scheme_end + 3;
        return format!("{}<credentials>{}", &arg[..host_start], &arg[at..]);
    }
    let path = Path::new(arg);
    if path.is_absolute() {
        let mut tail: Vec<_> = path
            .components()
            .filter(|c| matches!(c, Component::Normal(_)))
            .rev()
            .take(2)
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        tail.reverse();
        return tail.join("/");
    }
    arg.to_string()
}

// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Git version and repository capability detection

use std::fmt;
use std::path::Path;

use serde::Serialize;
use tracing::{debug, warn};

use crate::command::GitCommand;
use crate::config::Config;
use crate::context::Context;
use crate::error::{GitError, Result};
use crate::object_id::ObjectFormat;

/// Oldest git that understands `cat-file --batch-command`
pub const BATCH_COMMAND_MIN: GitVersion = GitVersion::new(2, 36, 0);

/// A `major.minor.patch` git version
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct GitVersion {
    /// Major version
    pub major: u32,
    /// Minor version
    pub minor: u32,
    /// Patch version
    pub patch: u32,
}

impl GitVersion {
    /// Build a version
    #[must_use]
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Parse the output of `git version`
    ///
    /// Accepts vendor suffixes such as `2.45.1.windows.1` or
    /// `2.39.3 (Apple Git-146)`; a missing patch component reads as zero.
    #[must_use]
    pub fn parse(output: &str) -> Option<Self> {
        let version = output.trim().strip_prefix("git version ")?;
        let version = version.split_whitespace().next()?;
        let mut parts = version.split('.').map(|p| {
            let digits: String = p.chars().take_while(char::is_ascii_digit).collect();
            digits.parse::<u32>().ok()
        });
        let major = parts.next()??;
        let minor = parts.next()??;
        let patch = parts.next().flatten().unwrap_or(0);
        Some(Self::new(major, minor, patch))
    }
}

impl fmt::Display for GitVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Capabilities of the installed git
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Features {
    /// Detected version
    pub version: GitVersion,
    /// Whether `cat-file --batch-command` is available
    pub supports_batch_command: bool,
}

impl Features {
    /// Derive capabilities from a version
    #[must_use]
    pub fn from_version(version: GitVersion) -> Self {
        Self {
            version,
            supports_batch_command: version >= BATCH_COMMAND_MIN,
        }
    }

    /// Run `git version` and derive capabilities
    ///
    /// # Errors
    ///
    /// Returns an error if git cannot be run or prints something that is
    /// not a version.
    pub fn detect(ctx: &Context, config: &Config) -> Result<Self> {
        let output = GitCommand::new(config).arg("version").run_std_string(ctx)?;
        let version = GitVersion::parse(&output).ok_or_else(|| GitError::MalformedResponse {
            line: output.trim().to_string(),
            reason: "unrecognized git version output",
        })?;
        let features = Self::from_version(version);
        debug!(%version, batch_command = features.supports_batch_command, "detected git features");
        Ok(features)
    }
}

/// Ask git which hash algorithm a repository uses
///
/// Versions of git that predate sha256 support echo the option back or
/// fail; both read as sha1.
///
/// # Errors
///
/// Returns `Cancelled` / `TimedOut` if the context stops the check.
pub fn detect_object_format(ctx: &Context, config: &Config, repo_path: &Path) -> Result<ObjectFormat> {
    let result = GitCommand::new(config)
        .args(&["rev-parse", "--show-object-format"])
        .dir(repo_path)
        .run_std_string(ctx);
    match result {
        Ok(output) => Ok(ObjectFormat::from_name(&output).unwrap_or_else(|| {
            debug!(output = %output.trim(), "unknown object format, assuming sha1");
            ObjectFormat::Sha1
        })),
        Err(e) if e.is_cancelled() => Err(e),
        Err(e) => {
            warn!(error = %e, "object format detection failed, assuming sha1");
            Ok(ObjectFormat::Sha1)
        }
    }
}

// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Error types for gitcat-batch

use std::io;

use thiserror::Error;

use crate::config::ConfigError;
use crate::context::CancelCause;

/// Result alias used throughout gitcat-batch
pub type Result<T, E = GitError> = std::result::Result<T, E>;

/// Errors that can occur while talking to git
#[derive(Debug, Error)]
pub enum GitError {
    /// The requested object does not exist (or is ambiguous)
    #[error("object not found: {id}")]
    NotFound {
        /// The identifier exactly as it was requested
        id: String,
    },

    /// A response header did not have the expected shape
    #[error("malformed cat-file response {line:?}: {reason}")]
    MalformedResponse {
        /// The offending line, lossily decoded
        line: String,
        /// What was wrong with it
        reason: &'static str,
    },

    /// The stream ended before a promised number of bytes arrived
    #[error("short read: expected {expected} bytes, got {actual}")]
    ShortRead {
        /// Bytes promised by the header
        expected: u64,
        /// Bytes actually available
        actual: u64,
    },

    /// A tree entry carried a mode outside the recognized set
    #[error("unsupported tree entry mode: {mode}")]
    UnsupportedMode {
        /// The raw mode string
        mode: String,
    },

    /// A tree record ended before its hash
    ///
    /// The payload and its separator were still consumed in full.
    #[error("truncated tree entry {name:?}")]
    TruncatedEntry {
        /// Name of the record, lossily decoded
        name: String,
    },

    /// The repository check failed before a conversation was opened
    #[error("not a valid git repository: {path}: {stderr}")]
    InvalidRepository {
        /// The path that was checked
        path: String,
        /// Diagnostic output captured from the check
        stderr: String,
    },

    /// The governing context was cancelled
    #[error("operation cancelled")]
    Cancelled,

    /// The governing context (or command timeout) expired
    #[error("operation timed out")]
    TimedOut,

    /// Error reading from or writing to a git process
    #[error("IO error: {0}")]
    Io(io::Error),

    /// A one-shot git command exited unsuccessfully
    #[error("{command} failed ({status}): {stderr}")]
    CommandFailed {
        /// Sanitized description of the command
        command: String,
        /// Exit status as reported by the OS
        status: String,
        /// Captured standard error
        stderr: String,
    },

    /// A string could not be parsed as an object id
    #[error("invalid object id: {value:?}")]
    InvalidObjectId {
        /// The rejected value
        value: String,
    },

    /// A caller-provided argument was rejected before running git
    #[error("invalid argument: {arg:?}")]
    InvalidArgument {
        /// The rejected argument
        arg: String,
    },

    /// An object payload lacked a required header field
    #[error("missing field in object payload: {field}")]
    MissingField {
        /// Name of the field that was searched for
        field: String,
    },

    /// Configuration failed validation
    #[error("invalid configuration: {0}")]
    InvalidConfig(#[from] ConfigError),
}

impl GitError {
    /// Whether the requested object was missing
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Whether the conversation that produced this error must be discarded
    ///
    /// Hard errors leave an unknown number of unread bytes on the stream.
    /// Everything else was raised with the stream still positioned at the
    /// start of the next response.
    #[must_use]
    pub fn is_hard(&self) -> bool {
        matches!(
            self,
            Self::MalformedResponse { .. }
                | Self::ShortRead { .. }
                | Self::Io(_)
                | Self::Cancelled
                | Self::TimedOut
                | Self::CommandFailed { .. }
        )
    }

    /// Whether the error came from cancellation or a timeout
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled | Self::TimedOut)
    }

    pub(crate) fn malformed(line: &[u8], reason: &'static str) -> Self {
        Self::MalformedResponse {
            line: String::from_utf8_lossy(line).into_owned(),
            reason,
        }
    }
}

impl From<io::Error> for GitError {
    fn from(err: io::Error) -> Self {
        match err.get_ref().and_then(|inner| inner.downcast_ref::<CancelCause>()) {
            Some(CancelCause::Cancelled) => Self::Cancelled,
            Some(CancelCause::TimedOut) => Self::TimedOut,
            None => Self::Io(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_cause_survives_io_roundtrip() {
        let err = io::Error::new(io::ErrorKind::BrokenPipe, CancelCause::TimedOut);
        assert!(matches!(GitError::from(err), GitError::TimedOut));

        let err = io::Error::new(io::ErrorKind::UnexpectedEof, CancelCause::Cancelled);
        assert!(GitError::from(err).is_cancelled());
    }

    #[test]
    fn test_plain_io_error_stays_io() {
        let err = io::Error::new(io::ErrorKind::BrokenPipe, "pipe closed");
        let err = GitError::from(err);
        assert!(matches!(err, GitError::Io(_)));
        assert!(err.is_hard());
        assert!(!err.is_cancelled());
    }

    #[test]
    fn test_classification() {
        let not_found = GitError::NotFound {
            id: "HEAD:nope".to_string(),
        };
        assert!(not_found.is_not_found());
        assert!(!not_found.is_hard());

        let mode = GitError::UnsupportedMode {
            mode: "100600".to_string(),
        };
        assert!(!mode.is_hard());

        let truncated = GitError::TruncatedEntry {
            name: "a".to_string(),
        };
        assert!(!truncated.is_hard());
        assert!(!truncated.is_not_found());

        assert!(GitError::malformed(b"garbage\n", "missing size").is_hard());
        assert!(GitError::ShortRead { expected: 10, actual: 3 }.is_hard());
    }

    #[test]
    fn test_display_includes_context() {
        let err = GitError::InvalidRepository {
            path: "/tmp/nowhere".to_string(),
            stderr: "fatal: not a git repository".to_string(),
        };
        let text = err.to_string();
        assert!(text.contains("/tmp/nowhere"));
        assert!(text.contains("fatal: not a git repository"));
    }
}

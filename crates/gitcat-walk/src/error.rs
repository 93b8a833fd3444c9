// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Error types for gitcat-walk

use gitcat_batch::GitError;
use thiserror::Error;

/// Result alias used throughout gitcat-walk
pub type Result<T, E = WalkError> = std::result::Result<T, E>;

/// Errors that can occur while walking repository objects
#[derive(Debug, Error)]
pub enum WalkError {
    /// Error from the batch protocol layer
    #[error(transparent)]
    Git(#[from] GitError),

    /// An object payload could not be parsed
    #[error("invalid object {id}: {reason}")]
    InvalidObject {
        /// Id (or revision) of the object
        id: String,
        /// What was wrong with it
        reason: String,
    },

    /// An object had a different type than the operation needs
    #[error("expected a {expected}, found a {actual}")]
    TypeMismatch {
        /// The type the operation needs
        expected: &'static str,
        /// The type git reported
        actual: String,
    },

    /// The last-commit cache rejected a write
    #[error("last-commit cache error: {0}")]
    Cache(String),
}

impl WalkError {
    pub(crate) fn invalid(id: impl ToString, reason: impl Into<String>) -> Self {
        Self::InvalidObject {
            id: id.to_string(),
            reason: reason.into(),
        }
    }

    /// Whether the error only reports a missing object
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Git(e) if e.is_not_found())
    }

    /// Whether the walk was stopped by cancellation or a timeout
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Git(e) if e.is_cancelled())
    }
}

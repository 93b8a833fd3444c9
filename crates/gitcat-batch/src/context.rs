// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Cancellation contexts
//!
//! A [`Context`] is a cheaply cloneable handle that can be cancelled
//! explicitly or expire at a deadline. Its done signal is a
//! `crossbeam_channel` receiver that never carries a value: dropping the
//! sender disconnects every receiver at once, which wakes any thread
//! selecting on it. Child contexts see their parent's cancellation.

use std::convert::Infallible;
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Select, Sender, at, never};
use parking_lot::Mutex;
use thiserror::Error;

use crate::error::GitError;

/// Why a context (or a supervised command) stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CancelCause {
    /// Explicit cancellation
    #[error("operation cancelled")]
    Cancelled,
    /// A deadline or timeout passed
    #[error("operation timed out")]
    TimedOut,
}

impl From<CancelCause> for GitError {
    fn from(cause: CancelCause) -> Self {
        match cause {
            CancelCause::Cancelled => GitError::Cancelled,
            CancelCause::TimedOut => GitError::TimedOut,
        }
    }
}

/// Cancellation handle threaded through every blocking operation
#[derive(Clone)]
pub struct Context {
    shared: Arc<Shared>,
}

struct Shared {
    done: Receiver<Infallible>,
    trigger: Mutex<Option<Sender<Infallible>>>,
    cause: OnceLock<CancelCause>,
    deadline: Option<Instant>,
    parent: Option<Context>,
}

impl Context {
    /// A root context that is only done when cancelled
    #[must_use]
    pub fn new() -> Self {
        Self::build(None, None)
    }

    /// A child that is cancelled with its parent or on its own
    #[must_use]
    pub fn with_cancel(&self) -> Self {
        Self::build(Some(self.clone()), self.shared.deadline)
    }

    /// A child that additionally expires after `timeout`
    #[must_use]
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        let deadline = Instant::now() + timeout;
        let deadline = match self.shared.deadline {
            Some(existing) if existing < deadline => existing,
            _ => deadline,
        };
        Self::build(Some(self.clone()), Some(deadline))
    }

    fn build(parent: Option<Context>, deadline: Option<Instant>) -> Self {
        let (trigger, done) = crossbeam_channel::bounded(0);
        Self {
            shared: Arc::new(Shared {
                done,
                trigger: Mutex::new(Some(trigger)),
                cause: OnceLock::new(),
                deadline,
                parent,
            }),
        }
    }

    /// Cancel this context and every context derived from it
    ///
    /// Calling this more than once has no further effect.
    pub fn cancel(&self) {
        self.finish(CancelCause::Cancelled);
    }

    fn finish(&self, cause: CancelCause) {
        let _ = self.shared.cause.set(cause);
        self.shared.trigger.lock().take();
    }

    /// The deadline, if any
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.shared.deadline
    }

    /// Why the context is done, or `None` while it is still live
    #[must_use]
    pub fn cause(&self) -> Option<CancelCause> {
        if let Some(cause) = self.shared.cause.get() {
            return Some(*cause);
        }
        if let Some(parent) = &self.shared.parent
            && let Some(cause) = parent.cause()
        {
            return Some(cause);
        }
        match self.shared.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(CancelCause::TimedOut),
            _ => None,
        }
    }

    /// Whether the context has been cancelled or has expired
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.cause().is_some()
    }

    /// Fail fast if the context is already done
    ///
    /// # Errors
    ///
    /// Returns `GitError::Cancelled` or `GitError::TimedOut`.
    pub fn check(&self) -> Result<(), GitError> {
        match self.cause() {
            Some(cause) => Err(cause.into()),
            None => Ok(()),
        }
    }

    /// Block until the context is done, `limit` passes, or `shutdown` fires
    ///
    /// Returns `None` when `shutdown` receives a value or disconnects,
    /// otherwise the reason the wait ended. A `limit` expiring is reported
    /// as [`CancelCause::TimedOut`] without marking the context itself done.
    pub fn wait(&self, shutdown: &Receiver<()>, limit: Option<Instant>) -> Option<CancelCause> {
        let mut chain = Vec::new();
        let mut cursor = Some(self);
        while let Some(ctx) = cursor {
            chain.push(&ctx.shared.done);
            cursor = ctx.shared.parent.as_ref();
        }

        let deadline = match (self.shared.deadline, limit) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        let timer = deadline.map_or_else(never, at);

        let mut sel = Select::new();
        let shutdown_index = sel.recv(shutdown);
        let timer_index = sel.recv(&timer);
        for done in &chain {
            sel.recv(done);
        }

        let op = sel.select();
        let index = op.index();
        if index == shutdown_index {
            let _ = op.recv(shutdown);
            None
        } else if index == timer_index {
            let _ = op.recv(&timer);
            if self.shared.deadline == deadline {
                self.finish(CancelCause::TimedOut);
            }
            Some(CancelCause::TimedOut)
        } else {
            let _ = op.recv(chain[index - 2]);
            Some(self.cause().unwrap_or(CancelCause::Cancelled))
        }
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("deadline", &self.shared.deadline)
            .field("cause", &self.cause())
            .finish()
    }
}

// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Primary-plus-temporary batch pool
//!
//! A cat-file stream cannot multiplex, so two callers must never share a
//! conversation mid-response. [`BatchPool`] keeps one primary batch per
//! repository and lends it to one caller at a time. A caller arriving while
//! the primary is out gets a temporary batch of its own, closed when the
//! lease ends. The pool mutex only guards bookkeeping; no I/O happens
//! while it is held.

use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::batch::{BatchTarget, BatchVariant, CatFileBatch, open_batch};
use crate::codec::CatFileObject;
use crate::communicator::BatchReader;
use crate::error::{GitError, Result};
use crate::features::Features;
use crate::object_id::ObjectFormat;

#[derive(Default)]
struct PoolState {
    primary: Option<Box<dyn CatFileBatch>>,
    primary_out: bool,
    closed: bool,
}

struct PoolShared {
    target: BatchTarget,
    features: Features,
    state: Mutex<PoolState>,
}

/// Hands out batches for one repository
#[derive(Clone)]
pub struct BatchPool {
    shared: Arc<PoolShared>,
}

impl BatchPool {
    /// Create an empty pool; nothing is started until the first acquire
    #[must_use]
    pub fn new(target: BatchTarget, features: Features) -> Self {
        Self {
            shared: Arc::new(PoolShared {
                target,
                features,
                state: Mutex::new(PoolState::default()),
            }),
        }
    }

    /// Borrow a batch
    ///
    /// Returns the primary when it is idle, opening it on first use, and a
    /// fresh temporary batch when the primary is already lent out.
    ///
    /// # Errors
    ///
    /// Returns the error from opening the primary. The slot is left empty
    /// so the next acquire starts over.
    pub fn acquire(&self) -> Result<BatchLease> {
        let primary = {
            let mut state = self.shared.state.lock();
            if state.closed || state.primary_out {
                None
            } else {
                state.primary_out = true;
                Some(state.primary.take())
            }
        };

        match primary {
            Some(Some(batch)) => Ok(self.lease(batch, true)),
            Some(None) => {
                let mut batch = open_batch(self.shared.target.clone(), &self.shared.features);
                if let Err(e) = batch.open() {
                    debug!(error = %e, "failed to open primary cat-file batch");
                    self.shared.state.lock().primary_out = false;
                    return Err(e);
                }
                Ok(self.lease(batch, true))
            }
            None => {
                debug!(
                    repo = %self.shared.target.repo_path.display(),
                    "primary cat-file batch busy, opening a temporary one"
                );
                let batch = open_batch(self.shared.target.clone(), &self.shared.features);
                Ok(self.lease(batch, false))
            }
        }
    }

    fn lease(&self, batch: Box<dyn CatFileBatch>, primary: bool) -> BatchLease {
        BatchLease {
            batch,
            primary,
            pool: Arc::clone(&self.shared),
        }
    }

    /// Whether the primary is currently lent out
    #[must_use]
    pub fn primary_in_use(&self) -> bool {
        self.shared.state.lock().primary_out
    }

    /// Close the idle primary; leases still out close when released
    pub fn close(&self) {
        let idle = {
            let mut state = self.shared.state.lock();
            state.closed = true;
            state.primary.take()
        };
        if let Some(mut batch) = idle {
            batch.close();
        }
    }
}

impl std::fmt::Debug for BatchPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("BatchPool")
            .field("repo_path", &self.shared.target.repo_path)
            .field("primary_open", &state.primary.is_some())
            .field("primary_out", &state.primary_out)
            .field("closed", &state.closed)
            .finish()
    }
}

/// A borrowed batch; returning it is automatic on drop
pub struct BatchLease {
    batch: Box<dyn CatFileBatch>,
    primary: bool,
    pool: Arc<PoolShared>,
}

impl BatchLease {
    /// Whether this lease holds the pool's primary batch
    #[must_use]
    pub fn is_primary(&self) -> bool {
        self.primary
    }

    /// Return the batch to the pool now
    pub fn release(self) {
        drop(self);
    }
}

impl Deref for BatchLease {
    type Target = dyn CatFileBatch;

    fn deref(&self) -> &Self::Target {
        &*self.batch
    }
}

impl DerefMut for BatchLease {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut *self.batch
    }
}

impl Drop for BatchLease {
    fn drop(&mut self) {
        let mut batch: Box<dyn CatFileBatch> = std::mem::replace(&mut self.batch, Box::new(Released));
        if !self.primary {
            batch.close();
            return;
        }

        let rejected = {
            let mut state = self.pool.state.lock();
            state.primary_out = false;
            if state.closed || !batch.is_usable() {
                Some(batch)
            } else {
                state.primary = Some(batch);
                None
            }
        };
        if let Some(mut batch) = rejected {
            debug!("discarding primary cat-file batch");
            batch.close();
        }
    }
}

/// Stands in for a batch that has gone back to the pool
struct Released;

impl Released {
    fn error() -> GitError {
        GitError::Io(std::io::Error::new(
            std::io::ErrorKind::NotConnected,
            "batch lease already released",
        ))
    }
}

impl CatFileBatch for Released {
    fn variant(&self) -> BatchVariant {
        BatchVariant::Command
    }

    fn object_format(&self) -> ObjectFormat {
        ObjectFormat::default()
    }

    fn query_info(&mut self, _id: &str) -> Result<CatFileObject> {
        Err(Self::error())
    }

    fn query_content(&mut self, _id: &str) -> Result<(CatFileObject, &mut BatchReader)> {
        Err(Self::error())
    }

    fn open(&mut self) -> Result<()> {
        Err(Self::error())
    }

    fn close(&mut self) {}

    fn is_usable(&self) -> bool {
        false
    }
}

impl std::fmt::Debug for BatchLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchLease")
            .field("primary", &self.primary)
            .finish_non_exhaustive()
    }
}

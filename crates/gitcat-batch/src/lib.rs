// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! gitcat-batch: Long-lived `git cat-file` conversations
//!
//! This library crate drives git's batch object protocol so that a process
//! can read many objects without spawning git once per object. It covers
//! the supervised subprocess, request and response framing, the legacy and
//! `--batch-command` protocol variants, and a pool that keeps one primary
//! conversation per repository.

#![warn(missing_docs)]

//! # Example
//!
//! ```no_run
//! use std::io::Read;
//! use std::sync::Arc;
//! use gitcat_batch::prelude::*;
//!
//! let ctx = Context::new();
//! let config = Arc::new(Config::default());
//! let features = Features::detect(&ctx, &config).expect("git installed");
//! let target = BatchTarget::new(ctx, "/srv/repo.git", config, ObjectFormat::Sha1);
//! let pool = BatchPool::new(target, features);
//!
//! let mut batch = pool.acquire().expect("open batch");
//! let (object, reader) = batch.query_content("HEAD:README.md").expect("query");
//! let mut text = String::new();
//! reader.read_to_string(&mut text).expect("read payload");
//! println!("{} {} bytes", object.id, object.size);
//! ```

pub mod batch;
pub mod codec;
pub mod command;
pub mod communicator;
pub mod config;
pub mod context;
pub mod error;
pub mod features;
pub mod object_id;
pub mod pool;
pub mod transport;

pub use batch::{BatchTarget, BatchVariant, CatFileBatch, CommandBatch, LegacyBatch, open_batch};
pub use codec::{CatFileObject, EntryMode, ObjectType, Request, TreeEntry};
pub use command::GitCommand;
pub use communicator::{BatchCommunicator, BatchReader, ensure_valid_repository};
pub use config::{BatchMode, Config, ConfigError};
pub use context::{CancelCause, Context};
pub use error::{GitError, Result};
pub use features::{Features, GitVersion, detect_object_format};
pub use object_id::{ObjectFormat, ObjectId};
pub use pool::{BatchLease, BatchPool};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::batch::{BatchTarget, CatFileBatch};
    pub use crate::codec::{CatFileObject, EntryMode, ObjectType, TreeEntry};
    pub use crate::config::Config;
    pub use crate::context::Context;
    pub use crate::error::GitError;
    pub use crate::features::Features;
    pub use crate::object_id::{ObjectFormat, ObjectId};
    pub use crate::pool::{BatchLease, BatchPool};
}

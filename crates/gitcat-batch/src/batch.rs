// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Protocol variants behind one interface
//!
//! Older git needs two processes: `cat-file --batch` for contents and
//! `cat-file --batch-check` for headers. From 2.36 a single
//! `cat-file --batch-command` process accepts `info` and `contents` verbs.
//! Both are exposed as [`CatFileBatch`] and picked once by [`open_batch`].
//!
//! Conversations are opened lazily. A conversation that hits a hard error
//! is closed on the spot and transparently reopened by the next call.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use crate::codec::{CatFileObject, Request};
use crate::communicator::{BatchCommunicator, BatchReader};
use crate::config::{BatchMode, Config};
use crate::context::Context;
use crate::error::{GitError, Result};
use crate::features::Features;
use crate::object_id::ObjectFormat;

const CONTENT_ARGS: &[&str] = &["cat-file", "--batch"];
const CHECK_ARGS: &[&str] = &["cat-file", "--batch-check"];
const COMMAND_ARGS: &[&str] = &["cat-file", "--batch-command"];

/// Which protocol variant a batch speaks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchVariant {
    /// Separate content and check processes
    Legacy,
    /// One `--batch-command` process
    Command,
}

/// Object access over cat-file
///
/// Not safe for concurrent use: each request must be answered in full
/// before the next one is written.
pub trait CatFileBatch: Send {
    /// The protocol variant in use
    fn variant(&self) -> BatchVariant;

    /// Hash format of the repository
    fn object_format(&self) -> ObjectFormat;

    /// Fetch the header of `id` without its payload
    ///
    /// # Errors
    ///
    /// `NotFound` for missing objects; hard errors close the conversation.
    fn query_info(&mut self, id: &str) -> Result<CatFileObject>;

    /// Fetch the header of `id` and a reader positioned at its payload
    ///
    /// Any part of the payload left unread is discarded before the next
    /// request.
    ///
    /// # Errors
    ///
    /// `NotFound` for missing objects; hard errors close the conversation.
    fn query_content(&mut self, id: &str) -> Result<(CatFileObject, &mut BatchReader)>;

    /// Start the underlying processes now instead of on first use
    ///
    /// # Errors
    ///
    /// Repository check or spawn failures.
    fn open(&mut self) -> Result<()>;

    /// Close every underlying process; safe to call repeatedly
    fn close(&mut self);

    /// Whether no conversation is in a failed state
    fn is_usable(&self) -> bool;
}

/// Where and how a batch starts its processes
#[derive(Debug, Clone)]
pub struct BatchTarget {
    /// Context governing every process the batch starts
    pub ctx: Context,
    /// Repository the processes run in
    pub repo_path: PathBuf,
    /// Command configuration
    pub config: Arc<Config>,
    /// Hash format of the repository
    pub format: ObjectFormat,
}

impl BatchTarget {
    /// Describe a repository
    pub fn new(ctx: Context, repo_path: impl AsRef<Path>, config: Arc<Config>, format: ObjectFormat) -> Self {
        Self {
            ctx,
            repo_path: repo_path.as_ref().to_path_buf(),
            config,
            format,
        }
    }

    fn spawn(&self, args: &[&'static str]) -> Result<BatchCommunicator> {
        BatchCommunicator::spawn(&self.ctx, &self.repo_path, &self.config, self.format, args)
    }
}

fn ensure<'a>(
    slot: &'a mut Option<BatchCommunicator>,
    target: &BatchTarget,
    args: &[&'static str],
) -> Result<&'a mut BatchCommunicator> {
    if let Some(existing) = slot.take() {
        if existing.is_usable() {
            return Ok(slot.insert(existing));
        }
        debug!(command = %existing.description(), "replacing failed cat-file conversation");
    }
    let conversation = target.spawn(args)?;
    Ok(slot.insert(conversation))
}

fn teardown_on_hard_error(slot: &mut Option<BatchCommunicator>, err: &GitError) {
    if err.is_hard()
        && let Some(mut conversation) = slot.take()
    {
        warn!(command = %conversation.description(), error = %err, "closing cat-file conversation after a hard error");
        conversation.close();
    }
}

fn query_header(
    slot: &mut Option<BatchCommunicator>,
    target: &BatchTarget,
    args: &[&'static str],
    request: Request<'_>,
) -> Result<CatFileObject> {
    let result = ensure(slot, target, args).and_then(|c| c.request(request));
    if let Err(e) = &result {
        teardown_on_hard_error(slot, e);
    }
    result
}

fn reader_of(slot: &mut Option<BatchCommunicator>) -> Result<&mut BatchReader> {
    slot.as_mut()
        .map(BatchCommunicator::reader)
        .ok_or_else(|| GitError::Io(std::io::Error::other("cat-file conversation vanished")))
}

/// `--batch` plus `--batch-check`, for git older than 2.36
#[derive(Debug)]
pub struct LegacyBatch {
    target: BatchTarget,
    content: Option<BatchCommunicator>,
    check: Option<BatchCommunicator>,
}

impl LegacyBatch {
    /// Create an unopened batch
    #[must_use]
    pub fn new(target: BatchTarget) -> Self {
        Self {
            target,
            content: None,
            check: None,
        }
    }
}

impl CatFileBatch for LegacyBatch {
    fn variant(&self) -> BatchVariant {
        BatchVariant::Legacy
    }

    fn object_format(&self) -> ObjectFormat {
        self.target.format
    }

    fn query_info(&mut self, id: &str) -> Result<CatFileObject> {
        query_header(&mut self.check, &self.target, CHECK_ARGS, Request::Legacy(id))
    }

    fn query_content(&mut self, id: &str) -> Result<(CatFileObject, &mut BatchReader)> {
        let object = query_header(&mut self.content, &self.target, CONTENT_ARGS, Request::Legacy(id))?;
        Ok((object, reader_of(&mut self.content)?))
    }

    fn open(&mut self) -> Result<()> {
        ensure(&mut self.content, &self.target, CONTENT_ARGS)?;
        ensure(&mut self.check, &self.target, CHECK_ARGS)?;
        Ok(())
    }

    fn close(&mut self) {
        for slot in [&mut self.content, &mut self.check] {
            if let Some(mut conversation) = slot.take() {
                conversation.close();
            }
        }
    }

    fn is_usable(&self) -> bool {
        [&self.content, &self.check]
            .into_iter()
            .flatten()
            .all(BatchCommunicator::is_usable)
    }
}

impl Drop for LegacyBatch {
    fn drop(&mut self) {
        self.close();
    }
}

/// One `--batch-command` process, for git 2.36 and later
#[derive(Debug)]
pub struct CommandBatch {
    target: BatchTarget,
    conversation: Option<BatchCommunicator>,
}

impl CommandBatch {
    /// Create an unopened batch
    #[must_use]
    pub fn new(target: BatchTarget) -> Self {
        Self {
            target,
            conversation: None,
        }
    }
}

impl CatFileBatch for CommandBatch {
    fn variant(&self) -> BatchVariant {
        BatchVariant::Command
    }

    fn object_format(&self) -> ObjectFormat {
        self.target.format
    }

    fn query_info(&mut self, id: &str) -> Result<CatFileObject> {
        query_header(&mut self.conversation, &self.target, COMMAND_ARGS, Request::Info(id))
    }

    fn query_content(&mut self, id: &str) -> Result<(CatFileObject, &mut BatchReader)> {
        let object = query_header(
            &mut self.conversation,
            &self.target,
            COMMAND_ARGS,
            Request::Contents(id),
        )?;
        Ok((object, reader_of(&mut self.conversation)?))
    }

    fn open(&mut self) -> Result<()> {
        ensure(&mut self.conversation, &self.target, COMMAND_ARGS).map(|_| ())
    }

    fn close(&mut self) {
        if let Some(mut conversation) = self.conversation.take() {
            conversation.close();
        }
    }

    fn is_usable(&self) -> bool {
        self.conversation
            .as_ref()
            .is_none_or(BatchCommunicator::is_usable)
    }
}

impl Drop for CommandBatch {
    fn drop(&mut self) {
        self.close();
    }
}

/// Resolve the configured mode against what the installed git supports
#[must_use]
pub fn select_variant(mode: BatchMode, features: &Features) -> BatchVariant {
    match mode {
        BatchMode::Legacy => BatchVariant::Legacy,
        BatchMode::Command => BatchVariant::Command,
        BatchMode::Auto if features.supports_batch_command => BatchVariant::Command,
        BatchMode::Auto => BatchVariant::Legacy,
    }
}

/// Build the batch implementation for `target`
#[must_use]
pub fn open_batch(target: BatchTarget, features: &Features) -> Box<dyn CatFileBatch> {
    match select_variant(target.config.batch_mode, features) {
        BatchVariant::Legacy => Box::new(LegacyBatch::new(target)),
        BatchVariant::Command => Box::new(CommandBatch::new(target)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::GitVersion;

    fn target() -> BatchTarget {
        BatchTarget::new(
            Context::new(),
            std::env::temp_dir(),
            Arc::new(Config::default()),
            ObjectFormat::Sha1,
        )
    }

    #[test]
    fn test_variant_selection() {
        let old = Features::from_version(GitVersion::new(2, 30, 0));
        let new = Features::from_version(GitVersion::new(2, 40, 0));
        assert_eq!(select_variant(BatchMode::Auto, &old), BatchVariant::Legacy);
        assert_eq!(select_variant(BatchMode::Auto, &new), BatchVariant::Command);
        assert_eq!(select_variant(BatchMode::Legacy, &new), BatchVariant::Legacy);
        assert_eq!(select_variant(BatchMode::Command, &old), BatchVariant::Command);
    }

    #[test]
    fn test_unopened_batches_close_cleanly() {
        let mut legacy = LegacyBatch::new(target());
        legacy.close();
        legacy.close();
        assert!(legacy.is_usable());

        let mut command = CommandBatch::new(target());
        command.close();
        command.close();
        assert!(command.is_usable());
    }

    #[test]
    fn test_open_batch_honours_mode() {
        let features = Features::from_version(GitVersion::new(2, 40, 0));
        let mut t = target();
        t.config = Arc::new(Config::default().with_batch_mode(BatchMode::Legacy));
        assert_eq!(open_batch(t, &features).variant(), BatchVariant::Legacy);
        assert_eq!(open_batch(target(), &features).variant(), BatchVariant::Command);
    }
}

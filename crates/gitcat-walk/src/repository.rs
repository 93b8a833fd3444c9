// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Repository handle tying the walkers to a pooled batch

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use gitcat_batch::{
    BatchLease, BatchPool, BatchTarget, Config, Context, Features, ObjectFormat, ObjectId,
    TreeEntry, detect_object_format, ensure_valid_repository,
};
use tracing::debug;

use crate::commit::{Commit, read_commit};
use crate::error::Result;
use crate::last_commit::{LastCommitCache, last_commits_for_paths};
use crate::submodule::{Submodule, submodules};
use crate::tag::{Tag, read_tag};
use crate::tree::{peel_to_commit, read_tree, tree_entry_by_path};

/// An opened repository
///
/// Cloning is cheap; clones share the batch pool.
#[derive(Debug, Clone)]
pub struct Repository {
    path: PathBuf,
    format: ObjectFormat,
    features: Features,
    pool: BatchPool,
}

impl Repository {
    /// Check `path`, detect its object format and the installed git's
    /// features, and set up a batch pool
    ///
    /// No cat-file process is started until the first read.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` for a rejected configuration, `InvalidRepository`
    /// if the check fails, or a cancellation error.
    pub fn open(ctx: &Context, path: impl AsRef<Path>, config: Config) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        config.validate().map_err(gitcat_batch::GitError::from)?;
        ensure_valid_repository(ctx, &path, &config)?;
        let format = detect_object_format(ctx, &config, &path)?;
        let features = Features::detect(ctx, &config)?;
        debug!(
            repo = %path.display(),
            format = %format,
            git = %features.version,
            batch_command = features.supports_batch_command,
            "opened repository"
        );

        let target = BatchTarget::new(ctx.clone(), &path, Arc::new(config), format);
        let pool = BatchPool::new(target, features);
        Ok(Self {
            path,
            format,
            features,
            pool,
        })
    }

    /// Repository location
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Hash format of the repository
    #[must_use]
    pub fn object_format(&self) -> ObjectFormat {
        self.format
    }

    /// Capabilities of the installed git
    #[must_use]
    pub fn features(&self) -> Features {
        self.features
    }

    /// Borrow a batch for a sequence of reads
    ///
    /// # Errors
    ///
    /// Fails if the primary batch cannot be started.
    pub fn batch(&self) -> Result<BatchLease> {
        Ok(self.pool.acquire()?)
    }

    /// Read a commit
    ///
    /// # Errors
    ///
    /// See [`read_commit`].
    pub fn commit(&self, rev: &str) -> Result<Commit> {
        read_commit(&mut *self.batch()?, rev)
    }

    /// Read an annotated tag
    ///
    /// # Errors
    ///
    /// See [`read_tag`].
    pub fn tag(&self, rev: &str) -> Result<Tag> {
        read_tag(&mut *self.batch()?, rev)
    }

    /// Read the entries of a tree (or of a commit's root tree)
    ///
    /// # Errors
    ///
    /// See [`read_tree`].
    pub fn tree(&self, rev: &str) -> Result<Vec<TreeEntry>> {
        read_tree(&mut *self.batch()?, rev)
    }

    /// Look up `path` in the root tree of `commit`
    ///
    /// # Errors
    ///
    /// See [`tree_entry_by_path`].
    pub fn entry_by_path(&self, commit: &str, path: &str) -> Result<Option<TreeEntry>> {
        let mut batch = self.batch()?;
        let commit = read_commit(&mut *batch, commit)?;
        tree_entry_by_path(&mut *batch, &commit.tree, path)
    }

    /// Resolve `rev` to a commit id, following annotated tags
    ///
    /// # Errors
    ///
    /// See [`peel_to_commit`].
    pub fn peel_to_commit(&self, rev: &str) -> Result<ObjectId> {
        peel_to_commit(&mut *self.batch()?, rev)
    }

    /// Submodules configured at `commit`
    ///
    /// # Errors
    ///
    /// See [`submodules`].
    pub fn submodules(&self, commit: &str) -> Result<Vec<Submodule>> {
        submodules(&mut *self.batch()?, commit)
    }

    /// Last commit that changed each of `names` under `tree_path`,
    /// walking back from `rev`
    ///
    /// # Errors
    ///
    /// See [`last_commits_for_paths`].
    pub fn last_commits<S: AsRef<str>>(
        &self,
        rev: &str,
        tree_path: &str,
        names: &[S],
        cache: Option<&dyn LastCommitCache>,
    ) -> Result<BTreeMap<String, ObjectId>> {
        let mut batch = self.batch()?;
        let start = peel_to_commit(&mut *batch, rev)?;
        last_commits_for_paths(&mut *batch, cache, &start, tree_path, names)
    }

    /// Close the pooled primary batch
    pub fn close(&self) {
        self.pool.close();
    }
}

// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! gitcat-walk: Commit, tree and history walkers over git cat-file
//!
//! This library crate builds object-level operations on top of
//! `gitcat-batch`: commit and tag parsing, tree lookup, `.gitmodules`
//! resolution and "last commit that touched each path" history walks.
//! Every read goes through a pooled cat-file batch.

#![warn(missing_docs)]

//! # Example
//!
//! ```no_run
//! use gitcat_batch::{Config, Context};
//! use gitcat_walk::{MemoryCache, Repository};
//!
//! let repo = Repository::open(&Context::new(), "/srv/repo.git", Config::default())
//!     .expect("open repo");
//! let head = repo.commit("HEAD").expect("read HEAD");
//! println!("{} {}", head.id.short(), head.summary());
//!
//! let names: Vec<String> = repo
//!     .tree("HEAD")
//!     .expect("root tree")
//!     .into_iter()
//!     .map(|e| e.name)
//!     .collect();
//! let cache = MemoryCache::new();
//! for (name, commit) in repo.last_commits("HEAD", "", &names, Some(&cache)).expect("walk") {
//!     println!("{name}: {}", commit.short());
//! }
//! ```

pub mod commit;
pub mod error;
pub mod last_commit;
pub mod repository;
pub mod submodule;
pub mod tag;
pub mod tree;

#[cfg(test)]
mod testing;

pub use commit::{Commit, Signature, read_commit};
pub use error::{Result, WalkError};
pub use last_commit::{LastCommitCache, MemoryCache, cache_key, last_commits_for_paths};
pub use repository::Repository;
pub use submodule::{Submodule, find_submodule, parse_gitmodules, submodules};
pub use tag::{Tag, read_tag};
pub use tree::{peel_to_commit, read_tree, tree_entry_by_path};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::commit::{Commit, Signature};
    pub use crate::error::WalkError;
    pub use crate::last_commit::{LastCommitCache, MemoryCache};
    pub use crate::repository::Repository;
    pub use crate::submodule::Submodule;
    pub use crate::tag::Tag;
}

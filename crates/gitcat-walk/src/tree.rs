// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Tree reading and path lookup

use gitcat_batch::{CatFileBatch, EntryMode, ObjectId, ObjectType, TreeEntry};
use tracing::debug;

use crate::error::{Result, WalkError};

/// Annotated tags nested deeper than this are treated as a cycle
const MAX_PEEL_DEPTH: usize = 32;

/// Read the entries of a tree
///
/// `rev` may name a tree or a commit; a commit is resolved to its root
/// tree first.
///
/// # Errors
///
/// `TypeMismatch` for any other object type, or any batch error.
pub fn read_tree(batch: &mut dyn CatFileBatch, rev: &str) -> Result<Vec<TreeEntry>> {
    let (object, reader) = batch.query_content(rev)?;
    match object.kind {
        ObjectType::Tree => Ok(reader.read_tree_entries()?),
        ObjectType::Commit => {
            let tree = reader.read_tree_id()?;
            read_tree_object(batch, &tree)
        }
        other => {
            reader.discard_rest()?;
            Err(WalkError::TypeMismatch {
                expected: "tree",
                actual: other.to_string(),
            })
        }
    }
}

pub(crate) fn read_tree_object(batch: &mut dyn CatFileBatch, tree: &ObjectId) -> Result<Vec<TreeEntry>> {
    let (object, reader) = batch.query_content(&tree.to_hex())?;
    if object.kind != ObjectType::Tree {
        reader.discard_rest()?;
        return Err(WalkError::TypeMismatch {
            expected: "tree",
            actual: object.kind.to_string(),
        });
    }
    Ok(reader.read_tree_entries()?)
}

/// Look up `path` below the tree `root`
///
/// Components are separated by `/`; empty components are ignored, so the
/// empty path names `root` itself. Returns `None` when a component is
/// missing or a non-tree is found in the middle of the path.
///
/// # Errors
///
/// Any batch error; a missing `root` is a `NotFound` error.
pub fn tree_entry_by_path(
    batch: &mut dyn CatFileBatch,
    root: &ObjectId,
    path: &str,
) -> Result<Option<TreeEntry>> {
    let mut current = TreeEntry {
        mode: EntryMode::Tree,
        name: String::new(),
        id: *root,
    };
    for component in path.split('/').filter(|c| !c.is_empty()) {
        if !current.mode.is_tree() {
            return Ok(None);
        }
        let entries = read_tree_object(batch, &current.id)?;
        match entries.into_iter().find(|e| e.name == component) {
            Some(entry) => current = entry,
            None => return Ok(None),
        }
    }
    Ok(Some(current))
}

/// Resolve `rev` to a commit, following annotated tags
///
/// # Errors
///
/// `TypeMismatch` if the chain ends at something other than a commit,
/// `InvalidObject` for a tag chain that does not end, or any batch error.
pub fn peel_to_commit(batch: &mut dyn CatFileBatch, rev: &str) -> Result<ObjectId> {
    let mut current = rev.to_string();
    for _ in 0..MAX_PEEL_DEPTH {
        let info = batch.query_info(&current)?;
        match info.kind {
            ObjectType::Commit => return Ok(info.id),
            ObjectType::Tag => {
                let (_, reader) = batch.query_content(&info.id.to_hex())?;
                let target = reader.read_tag_object_id()?;
                debug!(tag = %info.id, target = %target, "peeling annotated tag");
                current = target.to_hex();
            }
            other => {
                return Err(WalkError::TypeMismatch {
                    expected: "commit",
                    actual: other.to_string(),
                });
            }
        }
    }
    Err(WalkError::invalid(rev, "annotated tag chain too deep"))
}

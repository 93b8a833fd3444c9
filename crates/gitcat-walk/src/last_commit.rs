// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Last commit that touched each entry of a directory
//!
//! The walk starts at one commit and moves back through history most
//! recent first, carrying the set of names still unresolved together with
//! the hash each name had in the commit being examined. A name whose hash
//! matches in some parent keeps walking through the first such parent; a
//! name that matches in no parent was changed by the commit being
//! examined. Every resolution is written to the cache as soon as it is
//! found, so an aborted walk can leave entries behind.

use std::cmp::Ordering;
use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, BinaryHeap, HashMap};
use std::sync::Arc;

use gitcat_batch::{CatFileBatch, ObjectId, ObjectType};
use parking_lot::Mutex;
use tracing::debug;

use crate::commit::split_object;
use crate::error::{Result, WalkError};
use crate::tree::{read_tree_object, tree_entry_by_path};

/// Storage for resolved `(start commit, path)` pairs
pub trait LastCommitCache: Send + Sync {
    /// Look up a previously stored resolution
    fn get(&self, key: &str) -> Option<ObjectId>;

    /// Store a resolution
    ///
    /// # Errors
    ///
    /// Implementations report failures as `WalkError::Cache`; the walk
    /// aborts on the first one.
    fn put(&self, key: &str, commit: ObjectId) -> Result<()>;
}

/// Key under which the resolution of `path` from `start` is cached
#[must_use]
pub fn cache_key(start: &ObjectId, path: &str) -> String {
    format!("{start}:{path}")
}

/// In-process cache
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, ObjectId>>,
}

impl MemoryCache {
    /// Create an empty cache
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored resolutions
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether nothing is stored
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Forget everything
    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

impl LastCommitCache for MemoryCache {
    fn get(&self, key: &str) -> Option<ObjectId> {
        self.entries.lock().get(key).copied()
    }

    fn put(&self, key: &str, commit: ObjectId) -> Result<()> {
        self.entries.lock().insert(key.to_string(), commit);
        Ok(())
    }
}

fn join_path(dir: &str, name: &str) -> String {
    if dir.is_empty() {
        name.to_string()
    } else {
        format!("{dir}/{name}")
    }
}

/// What the walk needs to know about a commit
#[derive(Debug, PartialEq, Eq)]
struct CommitNode {
    tree: ObjectId,
    parents: Vec<ObjectId>,
    time: i64,
}

impl CommitNode {
    /// Read only `tree`, `parent` and the committer time
    ///
    /// Signatures are not validated, so commits git accepts with odd
    /// author or committer lines still walk. An unreadable committer time
    /// counts as 0.
    fn parse(id: ObjectId, payload: &[u8]) -> Result<Self> {
        let text = String::from_utf8_lossy(payload);
        let object = split_object(&text);
        let format = id.format();

        let mut tree = None;
        let mut parents = Vec::new();
        let mut time = 0;
        for (key, value) in &object.headers {
            match *key {
                "tree" => tree = Some(format.id_from_hex(value)?),
                "parent" => parents.push(format.id_from_hex(value)?),
                "committer" => time = committer_time(value),
                _ => {}
            }
        }
        Ok(Self {
            tree: tree.ok_or_else(|| WalkError::invalid(id, "missing tree"))?,
            parents,
            time,
        })
    }
}

/// Seconds field of `Name <email> 1700000000 +0100`
fn committer_time(line: &str) -> i64 {
    line.rsplit_once('>')
        .and_then(|(_, rest)| rest.split_whitespace().next()?.parse().ok())
        .unwrap_or(0)
}

/// Heap element; the newest commit pops first, then the earliest queued
#[derive(Debug, PartialEq, Eq)]
struct Queued {
    time: i64,
    seq: u64,
    commit: ObjectId,
}

impl Ord for Queued {
    fn cmp(&self, other: &Self) -> Ordering {
        self.time
            .cmp(&other.time)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Queued {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Names still open at one queued commit, with their hash there
type OpenPaths = Vec<(String, ObjectId)>;

struct Walk<'a> {
    batch: &'a mut dyn CatFileBatch,
    cache: Option<&'a dyn LastCommitCache>,
    start: ObjectId,
    tree_path: &'a str,
    nodes: HashMap<ObjectId, Arc<CommitNode>>,
    listings: HashMap<ObjectId, Arc<HashMap<String, ObjectId>>>,
    heap: BinaryHeap<Queued>,
    queued: HashMap<ObjectId, OpenPaths>,
    seq: u64,
    visited: usize,
}

impl Walk<'_> {
    fn node(&mut self, id: &ObjectId) -> Result<Arc<CommitNode>> {
        if let Some(node) = self.nodes.get(id) {
            return Ok(Arc::clone(node));
        }
        let (object, reader) = self.batch.query_content(&id.to_hex())?;
        if object.kind != ObjectType::Commit {
            reader.discard_rest()?;
            return Err(WalkError::TypeMismatch {
                expected: "commit",
                actual: object.kind.to_string(),
            });
        }
        let payload = reader.read_payload()?;
        let node = Arc::new(CommitNode::parse(*id, &payload)?);
        self.nodes.insert(*id, Arc::clone(&node));
        Ok(node)
    }

    /// Entries of the walked directory in the tree `root`
    ///
    /// A tree missing from the repository lists as empty.
    fn listing(&mut self, root: &ObjectId) -> Result<Arc<HashMap<String, ObjectId>>> {
        if let Some(listing) = self.listings.get(root) {
            return Ok(Arc::clone(listing));
        }
        let listing = match self.read_listing(root) {
            Ok(listing) => listing,
            Err(e) if e.is_not_found() => {
                debug!(tree = %root, tree_path = self.tree_path, "tree missing, treating it as empty");
                HashMap::new()
            }
            Err(e) => return Err(e),
        };
        let listing = Arc::new(listing);
        self.listings.insert(*root, Arc::clone(&listing));
        Ok(listing)
    }

    fn read_listing(&mut self, root: &ObjectId) -> Result<HashMap<String, ObjectId>> {
        Ok(match tree_entry_by_path(self.batch, root, self.tree_path)? {
            Some(dir) if dir.mode.is_tree() => read_tree_object(self.batch, &dir.id)?
                .into_iter()
                .map(|e| (e.name, e.id))
                .collect(),
            _ => HashMap::new(),
        })
    }

    fn enqueue(&mut self, commit: ObjectId, time: i64, path: String, hash: ObjectId) {
        match self.queued.entry(commit) {
            Entry::Occupied(mut open) => {
                if !open.get().iter().any(|(p, _)| *p == path) {
                    open.get_mut().push((path, hash));
                }
            }
            Entry::Vacant(slot) => {
                slot.insert(vec![(path, hash)]);
                self.seq += 1;
                self.heap.push(Queued {
                    time,
                    seq: self.seq,
                    commit,
                });
            }
        }
    }

    fn record(
        &mut self,
        resolved: &mut BTreeMap<String, ObjectId>,
        path: String,
        commit: ObjectId,
    ) -> Result<()> {
        if let Some(cache) = self.cache {
            cache.put(&cache_key(&self.start, &join_path(self.tree_path, &path)), commit)?;
        }
        resolved.insert(path, commit);
        Ok(())
    }

    fn run(&mut self, open: Vec<String>, resolved: &mut BTreeMap<String, ObjectId>) -> Result<()> {
        let start_id = self.start;
        let start = self.node(&start_id)?;
        let listing = self.listing(&start.tree)?;
        let mut wanted = resolved.len();
        for name in open {
            // absent at the start commit: no history to report
            if let Some(hash) = listing.get(&name).copied() {
                wanted += 1;
                self.enqueue(start_id, start.time, name, hash);
            }
        }

        while let Some(next) = self.heap.pop() {
            if resolved.len() == wanted {
                break;
            }
            let Some(paths) = self.queued.remove(&next.commit) else {
                continue;
            };
            let paths: OpenPaths = paths
                .into_iter()
                .filter(|(p, _)| !resolved.contains_key(p))
                .collect();
            if paths.is_empty() {
                continue;
            }
            self.visited += 1;

            let node = self.node(&next.commit)?;
            let mut parents = Vec::with_capacity(node.parents.len());
            for parent in &node.parents {
                let parent_node = match self.node(parent) {
                    Ok(n) => n,
                    Err(e) if e.is_not_found() => {
                        debug!(commit = %next.commit, parent = %parent, "parent missing, treating it as empty");
                        continue;
                    }
                    Err(e) => return Err(e),
                };
                let listing = self.listing(&parent_node.tree)?;
                parents.push((*parent, parent_node.time, listing));
            }

            for (path, hash) in paths {
                let unchanged_in = parents
                    .iter()
                    .find(|(_, _, listing)| listing.get(&path) == Some(&hash));
                match unchanged_in {
                    Some((parent, time, _)) => self.enqueue(*parent, *time, path, hash),
                    None => self.record(resolved, path, next.commit)?,
                }
            }
        }
        Ok(())
    }
}

/// Resolve, for each of `names` directly under `tree_path`, the most
/// recent commit reachable from `start` that changed it
///
/// Names absent from `start` are left out of the result. Cached
/// resolutions are used where present and new ones written through.
///
/// # Errors
///
/// Any hard batch error or cache failure aborts the walk; no partial
/// result is returned.
pub fn last_commits_for_paths<S: AsRef<str>>(
    batch: &mut dyn CatFileBatch,
    cache: Option<&dyn LastCommitCache>,
    start: &ObjectId,
    tree_path: &str,
    names: &[S],
) -> Result<BTreeMap<String, ObjectId>> {
    let tree_path = tree_path.trim_matches('/');
    let mut resolved = BTreeMap::new();
    let mut open = Vec::new();
    for name in names {
        let name = name.as_ref();
        if name.is_empty() || name.contains('/') {
            return Err(WalkError::invalid(name, "not a single path component"));
        }
        if resolved.contains_key(name) || open.iter().any(|n| n == name) {
            continue;
        }
        let hit = cache.and_then(|c| c.get(&cache_key(start, &join_path(tree_path, name))));
        match hit {
            Some(commit) => {
                resolved.insert(name.to_string(), commit);
            }
            None => open.push(name.to_string()),
        }
    }

    let cache_hits = resolved.len();
    if open.is_empty() {
        debug!(start = %start, tree_path, cache_hits, "last commits served from cache");
        return Ok(resolved);
    }

    let mut walk = Walk {
        batch,
        cache,
        start: *start,
        tree_path,
        nodes: HashMap::new(),
        listings: HashMap::new(),
        heap: BinaryHeap::new(),
        queued: HashMap::new(),
        seq: 0,
        visited: 0,
    };
    walk.run(open, &mut resolved)?;
    debug!(
        start = %start,
        tree_path,
        cache_hits,
        resolved = resolved.len(),
        visited = walk.visited,
        "last commit walk finished"
    );
    Ok(resolved)
}

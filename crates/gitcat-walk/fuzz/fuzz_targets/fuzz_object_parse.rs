// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Fuzz target for commit and tag payload parsing
//!
//! Arbitrary payloads must be rejected with an error, never a panic.

#![no_main]

use libfuzzer_sys::fuzz_target;

use gitcat_batch::ObjectFormat;
use gitcat_walk::{Commit, Tag};

fuzz_target!(|data: &[u8]| {
    for format in [ObjectFormat::Sha1, ObjectFormat::Sha256] {
        let id = format.empty_tree_id();
        if let Ok(commit) = Commit::parse(id, data) {
            assert_eq!(commit.tree.format(), format);
            let _ = commit.summary();
            let _ = commit.time();
        }
        if let Ok(tag) = Tag::parse(id, data) {
            assert_eq!(tag.object.format(), format);
            if let Some(signature) = &tag.signature {
                assert!(signature.starts_with("-----BEGIN"));
            }
        }
    }
});

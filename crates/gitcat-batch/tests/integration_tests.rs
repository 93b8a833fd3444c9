// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Integration tests for gitcat-batch
//!
//! These tests drive real `git cat-file` processes against fixture
//! repositories built with the git binary.


use std::io::Read;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use gitcat_batch::transport::Transport;
use gitcat_batch::{
    BatchCommunicator, BatchMode, BatchPool, BatchTarget, BatchVariant, CatFileBatch,
    CommandBatch, Config, Context, EntryMode, Features, GitCommand, GitError, LegacyBatch,
    ObjectFormat, ObjectType, Request, detect_object_format, open_batch,
};
use similar_asserts::assert_eq;
use test_utils::{FILE1_BLOB, Repo1, Sha256Repo, TempTestDir, TestGitRepo};

const MISSING: &str = "0123456789abcdef0123456789abcdef01234567";

fn target(path: &std::path::Path, format: ObjectFormat) -> BatchTarget {
    BatchTarget::new(Context::new(), path, Arc::new(Config::default()), format)
}

fn features() -> Features {
    Features::detect(&Context::new(), &Config::default()).expect("git is installed")
}

/// Both variants, skipping `--batch-command` on git older than 2.36
fn variants(target: &BatchTarget) -> Vec<Box<dyn CatFileBatch>> {
    let mut batches: Vec<Box<dyn CatFileBatch>> = vec![Box::new(LegacyBatch::new(target.clone()))];
    if features().supports_batch_command {
        batches.push(Box::new(CommandBatch::new(target.clone())));
    }
    batches
}

// ============================================================================
// Known objects
// ============================================================================

#[test]
fn test_repo1_blob_info() {
    let repo = Repo1::new("blob-info");
    for mut batch in variants(&target(&repo.bare, ObjectFormat::Sha1)) {
        let info = batch.query_info(FILE1_BLOB).expect("blob exists");
        assert_eq!(info.id.to_hex(), FILE1_BLOB);
        assert_eq!(info.kind, ObjectType::Blob);
        assert_eq!(info.size, 6);
    }
}

#[test]
fn test_repo1_blob_content() {
    let repo = Repo1::new("blob-content");
    for mut batch in variants(&target(&repo.bare, ObjectFormat::Sha1)) {
        let (info, reader) = batch.query_content(FILE1_BLOB).expect("blob exists");
        assert_eq!(info.kind, ObjectType::Blob);
        assert_eq!(info.size, 6);
        let mut body = [0u8; 6];
        reader.read_exact(&mut body).expect("six payload bytes");
        assert_eq!(&body, b"file1\n");
        reader.discard_rest().expect("separator");
    }
}

#[test]
fn test_revision_expressions_resolve() {
    let repo = Repo1::new("revisions");
    for mut batch in variants(&target(&repo.bare, ObjectFormat::Sha1)) {
        let info = batch.query_info("HEAD:file1").expect("path lookup");
        assert_eq!(info.id.to_hex(), FILE1_BLOB);
        let info = batch.query_info("HEAD~2").expect("ancestor");
        assert_eq!(info.id.to_hex(), repo.commits[0]);
        assert_eq!(info.kind, ObjectType::Commit);
    }
}

// ============================================================================
// Missing objects
// ============================================================================

#[test]
fn test_missing_object_then_unrelated_query() {
    let repo = Repo1::new("missing");
    for mut batch in variants(&target(&repo.bare, ObjectFormat::Sha1)) {
        match batch.query_info(MISSING) {
            Err(GitError::NotFound { id }) => assert_eq!(id, MISSING),
            other => panic!("expected not found, got {other:?}"),
        }
        assert!(batch.is_usable());
        let info = batch.query_info(FILE1_BLOB).expect("conversation still usable");
        assert_eq!(info.size, 6);

        assert!(batch.query_content(MISSING).expect_err("missing").is_not_found());
        let (info, reader) = batch.query_content("HEAD:file1").expect("still usable");
        assert_eq!(info.size, 6);
        assert_eq!(reader.read_payload().expect("payload"), b"file1\n");
    }
}

#[test]
fn test_missing_path_expression() {
    let repo = Repo1::new("missing-path");
    for mut batch in variants(&target(&repo.bare, ObjectFormat::Sha1)) {
        match batch.query_info("HEAD:no such file") {
            Err(GitError::NotFound { id }) => assert_eq!(id, "HEAD:no such file"),
            other => panic!("expected not found, got {other:?}"),
        }
        assert!(batch.query_info("HEAD").is_ok());
    }
}

// ============================================================================
// Variant equivalence
// ============================================================================

#[derive(Debug, PartialEq)]
enum Outcome {
    Found(String, String, u64, Option<Vec<u8>>),
    NotFound(String),
}

fn run_script(batch: &mut dyn CatFileBatch, ids: &[&str]) -> Vec<Outcome> {
    let mut out = Vec::new();
    for id in ids {
        out.push(match batch.query_info(id) {
            Ok(o) => Outcome::Found(o.id.to_hex(), o.kind.to_string(), o.size, None),
            Err(e) if e.is_not_found() => Outcome::NotFound(id.to_string()),
            Err(e) => panic!("hard error on info {id}: {e}"),
        });
        out.push(match batch.query_content(id) {
            Ok((o, reader)) => {
                let body = reader.read_payload().expect("payload");
                Outcome::Found(o.id.to_hex(), o.kind.to_string(), o.size, Some(body))
            }
            Err(e) if e.is_not_found() => Outcome::NotFound(id.to_string()),
            Err(e) => panic!("hard error on content {id}: {e}"),
        });
    }
    out
}

#[test]
fn test_variant_equivalence() {
    if !features().supports_batch_command {
        return;
    }
    let repo = Repo1::new("equivalence");
    let t = target(&repo.bare, ObjectFormat::Sha1);
    let ids = [
        "HEAD",
        "HEAD^{tree}",
        FILE1_BLOB,
        MISSING,
        "HEAD:dir",
        "HEAD:dir/file2",
        "HEAD~1",
        "nope",
    ];
    let legacy = run_script(&mut LegacyBatch::new(t.clone()), &ids);
    let command = run_script(&mut CommandBatch::new(t), &ids);
    assert_eq!(legacy, command);
    assert_eq!(legacy.len(), ids.len() * 2);
}

// ============================================================================
// Payload helpers against real objects
// ============================================================================

#[test]
fn test_tree_id_from_commit_and_tree_entries() {
    let repo = Repo1::new("tree-entries");
    let expected_tree = repo.work.rev_parse("HEAD^{tree}");
    for mut batch in variants(&target(&repo.bare, ObjectFormat::Sha1)) {
        let (_, reader) = batch.query_content("HEAD").expect("commit");
        let tree = reader.read_tree_id().expect("tree field");
        assert_eq!(tree.to_hex(), expected_tree);

        let (info, reader) = batch.query_content(&tree.to_hex()).expect("tree");
        assert_eq!(info.kind, ObjectType::Tree);
        let entries = reader.read_tree_entries().expect("entries");
        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["dir", "file1", "file3"]);
        assert_eq!(entries[0].mode, EntryMode::Tree);
        assert_eq!(entries[1].id.to_hex(), FILE1_BLOB);

        // the stream is aligned for the next request
        assert_eq!(batch.query_info(FILE1_BLOB).expect("next").size, 6);
    }
}

#[test]
fn test_partial_payload_read_is_drained() {
    let repo = Repo1::new("partial");
    for mut batch in variants(&target(&repo.bare, ObjectFormat::Sha1)) {
        let (_, reader) = batch.query_content("HEAD").expect("commit");
        let mut first = [0u8; 4];
        reader.read_exact(&mut first).expect("first bytes");
        assert_eq!(&first, b"tree");
        let info = batch.query_info(FILE1_BLOB).expect("next request after partial read");
        assert_eq!(info.size, 6);
    }
}

#[test]
fn test_sha256_repository() {
    let fixture = Sha256Repo::new("sha256");
    let ctx = Context::new();
    let format =
        detect_object_format(&ctx, &Config::default(), fixture.repo.path()).expect("detect");
    assert_eq!(format, ObjectFormat::Sha256);

    for mut batch in variants(&target(fixture.repo.path(), format)) {
        let info = batch.query_info("HEAD:empty").expect("empty blob");
        assert_eq!(
            info.id.to_hex(),
            "473a0f4c3be8a93681a267e3b1e9a7dcda1185436fe141f7749120a303721813"
        );
        assert_eq!(info.size, 0);

        let (_, reader) = batch.query_content(&fixture.head).expect("commit");
        let tree = reader.read_tree_id().expect("tree field");
        assert_eq!(tree.as_bytes().len(), 32);

        let (_, reader) = batch.query_content(&tree.to_hex()).expect("tree");
        let entries = reader.read_tree_entries().expect("sha256 entries");
        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["empty", "src"]);
        assert!(entries.iter().all(|e| e.id.format() == ObjectFormat::Sha256));

        let (_, reader) = batch.query_content("HEAD:src/lib.rs").expect("blob");
        let body = reader.read_payload().expect("payload");
        assert_eq!(body, b"pub fn answer() -> u32 { 42 }\n");
    }
}

#[test]
fn test_sha1_repository_format_detection() {
    let repo = Repo1::new("sha1-detect");
    let format = detect_object_format(&Context::new(), &Config::default(), &repo.bare)
        .expect("detect");
    assert_eq!(format, ObjectFormat::Sha1);
}

// ============================================================================
// Lifecycle
// ============================================================================

#[test]
fn test_close_is_idempotent_on_live_batches() {
    let repo = Repo1::new("close");
    for mut batch in variants(&target(&repo.bare, ObjectFormat::Sha1)) {
        batch.open().expect("open");
        batch.query_info(FILE1_BLOB).expect("query");
        batch.close();
        batch.close();
        // lazily reopened
        assert_eq!(batch.query_info(FILE1_BLOB).expect("reopened").size, 6);
    }

    let mut comm = BatchCommunicator::spawn(
        &Context::new(),
        &repo.bare,
        &Config::default(),
        ObjectFormat::Sha1,
        &["cat-file", "--batch-check"],
    )
    .expect("spawn");
    let info = comm.request(Request::Legacy(FILE1_BLOB)).expect("query");
    assert_eq!(info.size, 6);
    comm.close();
    comm.close();
    assert!(!comm.is_usable());
}

#[test]
fn test_invalid_repository_fails_fast() {
    let temp = TempTestDir::new("not-a-repo");
    let plain = temp.create_subdir("plain");
    for mut batch in variants(&target(&plain, ObjectFormat::Sha1)) {
        match batch.query_info("HEAD") {
            Err(GitError::InvalidRepository { stderr, .. }) => {
                assert!(stderr.contains("not a git repository"), "stderr: {stderr}");
            }
            other => panic!("expected invalid repository, got {other:?}"),
        }
    }
}

#[test]
fn test_newline_in_request_rejected() {
    let repo = Repo1::new("newline");
    for mut batch in variants(&target(&repo.bare, ObjectFormat::Sha1)) {
        let err = batch.query_info("HEAD\nHEAD").expect_err("injection");
        assert!(matches!(err, GitError::InvalidArgument { .. }));
        assert!(batch.query_info("HEAD").is_ok());
    }
}

// ============================================================================
// Cancellation
// ============================================================================

#[test]
fn test_cancellation_unblocks_pending_read() {
    let repo = Repo1::new("cancel");
    let ctx = Context::new();
    let cmd = GitCommand::new(&Config::default())
        .args(&["cat-file", "--batch"])
        .dir(&repo.bare)
        .timeout(None);
    let mut transport = Transport::spawn(&cmd, &ctx).expect("spawn cat-file");
    let _stdin = transport.take_stdin().expect("stdin");
    let mut stdout = transport.take_stdout().expect("stdout");

    let canceller = {
        let ctx = ctx.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            ctx.cancel();
        })
    };

    // no request was written, so this read only returns once the process dies
    let mut byte = [0u8; 1];
    let err = stdout.read(&mut byte).expect_err("cancelled");
    assert!(GitError::from(err).is_cancelled());
    canceller.join().expect("canceller");
    assert!(matches!(transport.wait(), Err(GitError::Cancelled)));
}

#[test]
fn test_cancelled_context_stops_batches() {
    let repo = Repo1::new("cancel-batch");
    let ctx = Context::new();
    let t = BatchTarget::new(ctx.clone(), &repo.bare, Arc::new(Config::default()), ObjectFormat::Sha1);
    for mut batch in variants(&t) {
        batch.query_info(FILE1_BLOB).expect("live");
    }
    ctx.cancel();
    for mut batch in variants(&t) {
        let err = batch.query_info(FILE1_BLOB).expect_err("cancelled");
        assert!(matches!(err, GitError::Cancelled));
    }
}

#[test]
fn test_expired_deadline_reports_timeout() {
    let repo = Repo1::new("deadline");
    let ctx = Context::new().with_timeout(Duration::from_millis(1));
    thread::sleep(Duration::from_millis(10));
    let t = BatchTarget::new(ctx, &repo.bare, Arc::new(Config::default()), ObjectFormat::Sha1);
    let mut batch = LegacyBatch::new(t);
    assert!(matches!(batch.query_info("HEAD"), Err(GitError::TimedOut)));
}

// ============================================================================
// Pool
// ============================================================================

#[test]
fn test_pool_primary_and_temporary() {
    let repo = Repo1::new("pool");
    let pool = BatchPool::new(target(&repo.bare, ObjectFormat::Sha1), features());

    let mut first = pool.acquire().expect("primary");
    assert!(first.is_primary());
    assert!(pool.primary_in_use());

    let mut second = pool.acquire().expect("temporary");
    assert!(!second.is_primary());

    // both conversations are independent
    let (_, reader) = first.query_content(FILE1_BLOB).expect("first content");
    let mut head = [0u8; 2];
    reader.read_exact(&mut head).expect("partial read");
    assert_eq!(second.query_info(FILE1_BLOB).expect("second").size, 6);

    second.release();
    first.release();
    assert!(!pool.primary_in_use());

    let again = pool.acquire().expect("primary again");
    assert!(again.is_primary());
    drop(again);
    pool.close();
}

#[test]
fn test_pool_concurrent_borrowers() {
    let repo = Repo1::new("pool-threads");
    let pool = BatchPool::new(target(&repo.bare, ObjectFormat::Sha1), features());

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let pool = pool.clone();
            thread::spawn(move || {
                for _ in 0..20 {
                    let mut batch = pool.acquire().expect("acquire");
                    let (info, reader) = batch.query_content(FILE1_BLOB).expect("content");
                    assert_eq!(info.size, 6);
                    assert_eq!(reader.read_payload().expect("payload"), b"file1\n");
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("borrower thread");
    }
    assert!(!pool.primary_in_use());
}

#[test]
fn test_pool_honours_forced_mode() {
    let repo = Repo1::new("pool-mode");
    let config = Arc::new(Config::default().with_batch_mode(BatchMode::Legacy));
    let t = BatchTarget::new(Context::new(), &repo.bare, config, ObjectFormat::Sha1);
    let pool = BatchPool::new(t.clone(), features());
    let batch = pool.acquire().expect("primary");
    assert_eq!(batch.variant(), BatchVariant::Legacy);
    assert_eq!(open_batch(t, &features()).variant(), BatchVariant::Legacy);
}

#[test]
fn test_pool_primary_failure_then_recovery() {
    let temp = TempTestDir::new("pool-recover");
    let path = temp.path().join("late");
    let pool = BatchPool::new(target(&path, ObjectFormat::Sha1), features());
    assert!(matches!(
        pool.acquire(),
        Err(GitError::InvalidRepository { .. })
    ));

    // the repository appears after the failed attempt
    let repo = TestGitRepo::init(path, "sha1");
    repo.create_and_commit("file1", "file1\n", "add file1");
    let mut batch = pool.acquire().expect("retry opens a fresh primary");
    assert!(batch.is_primary());
    assert_eq!(batch.query_info(FILE1_BLOB).expect("blob").size, 6);
}

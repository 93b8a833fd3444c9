// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! One cat-file conversation
//!
//! A [`BatchCommunicator`] pairs a request sink with a buffered response
//! source. Exactly one caller drives it at a time: write a request, read
//! the whole response, repeat. The [`BatchReader`] tracks how much of the
//! current payload is still unread so that a caller who stops early does
//! not desynchronize the next response.

use std::io::{self, BufReader, Read, Write};
use std::path::Path;

use tracing::{debug, warn};

use crate::codec::{self, CatFileObject, Request, TreeEntry};
use crate::command::GitCommand;
use crate::config::Config;
use crate::context::Context;
use crate::error::{GitError, Result};
use crate::object_id::{ObjectFormat, ObjectId};
use crate::transport::Transport;

/// Buffered response source of a conversation
pub struct BatchReader {
    inner: BufReader<Box<dyn Read + Send>>,
    format: ObjectFormat,
    pending: u64,
    separator_due: bool,
    poisoned: bool,
}

impl BatchReader {
    fn new(source: Box<dyn Read + Send>, format: ObjectFormat) -> Self {
        Self {
            inner: BufReader::with_capacity(64 * 1024, source),
            format,
            pending: 0,
            separator_due: false,
            poisoned: false,
        }
    }

    /// Hash format used to decode ids
    #[must_use]
    pub fn format(&self) -> ObjectFormat {
        self.format
    }

    /// Payload bytes of the current response not yet consumed
    #[must_use]
    pub fn pending(&self) -> u64 {
        self.pending
    }

    /// Whether a hard error left the stream in an unknown position
    #[must_use]
    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    fn track<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result
            && e.is_hard()
        {
            self.poisoned = true;
        }
        result
    }

    pub(crate) fn read_header(&mut self) -> Result<CatFileObject> {
        let result = codec::read_batch_line(&mut self.inner, self.format);
        self.track(result)
    }

    pub(crate) fn begin_payload(&mut self, size: u64) {
        self.pending = size;
        self.separator_due = true;
    }

    /// Discard whatever is left of the current payload and its separator
    ///
    /// # Errors
    ///
    /// Returns a hard stream error if the bytes cannot be consumed.
    pub fn discard_rest(&mut self) -> Result<()> {
        if !self.separator_due {
            return Ok(());
        }
        let remaining = self.pending;
        self.pending = 0;
        self.separator_due = false;
        let result = codec::discard_full(&mut self.inner, remaining)
            .and_then(|()| codec::discard_separator(&mut self.inner));
        self.track(result)
    }

    fn with_payload<T>(
        &mut self,
        decode: impl FnOnce(&mut BufReader<Box<dyn Read + Send>>, ObjectFormat, u64) -> Result<T>,
    ) -> Result<T> {
        if !self.separator_due {
            return Err(GitError::InvalidArgument {
                arg: "no payload is pending on this conversation".to_string(),
            });
        }
        let size = self.pending;
        self.pending = 0;
        self.separator_due = false;
        let result = decode(&mut self.inner, self.format, size);
        self.track(result)
    }

    /// Read the remaining payload into memory and consume its separator
    ///
    /// # Errors
    ///
    /// `ShortRead` if the process sends fewer bytes than promised.
    pub fn read_payload(&mut self) -> Result<Vec<u8>> {
        self.with_payload(|rd, _, size| codec::read_payload(rd, size))
    }

    /// Extract one header field and discard the rest of the payload
    ///
    /// # Errors
    ///
    /// See [`codec::read_field_and_discard`].
    pub fn read_field(&mut self, field: &str) -> Result<String> {
        self.with_payload(|rd, _, size| codec::read_field_and_discard(rd, field, size))
    }

    /// Extract the `tree` id of a commit payload
    ///
    /// # Errors
    ///
    /// See [`codec::read_tree_id`].
    pub fn read_tree_id(&mut self) -> Result<ObjectId> {
        self.with_payload(codec::read_tree_id)
    }

    /// Extract the `object` id of a tag payload
    ///
    /// # Errors
    ///
    /// See [`codec::read_tag_object_id`].
    pub fn read_tag_object_id(&mut self) -> Result<ObjectId> {
        self.with_payload(codec::read_tag_object_id)
    }

    /// Decode a tree payload
    ///
    /// # Errors
    ///
    /// See [`codec::read_tree_entries`].
    pub fn read_tree_entries(&mut self) -> Result<Vec<TreeEntry>> {
        self.with_payload(codec::read_tree_entries)
    }

    fn detach(&mut self) {
        self.inner = BufReader::new(Box::new(io::empty()));
        self.poisoned = true;
    }
}

/// Reads the current payload only; returns EOF at its end
impl Read for BatchReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.pending == 0 || buf.is_empty() {
            return Ok(0);
        }
        let limit = buf.len().min(usize::try_from(self.pending).unwrap_or(usize::MAX));
        match self.inner.read(&mut buf[..limit]) {
            Ok(0) => {
                self.poisoned = true;
                Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("cat-file stream ended with {} payload bytes unread", self.pending),
                ))
            }
            Ok(n) => {
                self.pending -= n as u64;
                Ok(n)
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => Err(e),
            Err(e) => {
                self.poisoned = true;
                Err(e)
            }
        }
    }
}

impl std::fmt::Debug for BatchReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchReader")
            .field("format", &self.format)
            .field("pending", &self.pending)
            .field("poisoned", &self.poisoned)
            .finish_non_exhaustive()
    }
}

/// A single cat-file process and its two streams
pub struct BatchCommunicator {
    writer: Option<Box<dyn Write + Send>>,
    reader: BatchReader,
    transport: Option<Transport>,
    description: String,
    legacy_payloads: bool,
}

impl BatchCommunicator {
    /// Validate `repo_path`, then start `git <args>` in it
    ///
    /// # Errors
    ///
    /// `InvalidRepository` if the repository check fails, or a spawn error.
    pub fn spawn(
        ctx: &Context,
        repo_path: &Path,
        config: &Config,
        format: ObjectFormat,
        args: &[&'static str],
    ) -> Result<Self> {
        ensure_valid_repository(ctx, repo_path, config)?;

        let cmd = GitCommand::new(config).args(args).dir(repo_path).timeout(None);
        let mut transport = Transport::spawn(&cmd, ctx)?;
        let writer = transport
            .take_stdin()
            .ok_or_else(|| GitError::Io(io::Error::other("git stdin was not piped")))?;
        let reader = transport
            .take_stdout()
            .ok_or_else(|| GitError::Io(io::Error::other("git stdout was not piped")))?;
        let description = transport.description().to_string();
        debug!(command = %description, "opened cat-file conversation");

        Ok(Self {
            writer: Some(Box::new(writer)),
            reader: BatchReader::new(Box::new(reader), format),
            transport: Some(transport),
            description,
            legacy_payloads: !args.contains(&"--batch-check"),
        })
    }

    /// Build a conversation over arbitrary streams
    ///
    /// Used to drive the protocol against an in-memory peer.
    pub fn from_parts(
        reader: impl Read + Send + 'static,
        writer: impl Write + Send + 'static,
        format: ObjectFormat,
    ) -> Self {
        Self {
            writer: Some(Box::new(writer)),
            reader: BatchReader::new(Box::new(reader), format),
            transport: None,
            description: "in-memory conversation".to_string(),
            legacy_payloads: true,
        }
    }

    /// Sanitized description of the underlying command
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Whether the conversation can take another request
    #[must_use]
    pub fn is_usable(&self) -> bool {
        self.writer.is_some() && !self.reader.is_poisoned()
    }

    /// Write a request, after draining any unread part of the previous
    /// response
    ///
    /// # Errors
    ///
    /// Fails if the conversation is closed or poisoned, the request is
    /// invalid, or the write fails.
    pub fn send(&mut self, request: Request<'_>) -> Result<()> {
        if self.reader.is_poisoned() {
            return Err(GitError::Io(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "conversation is unusable after an earlier error",
            )));
        }
        self.reader.discard_rest()?;
        let Some(writer) = self.writer.as_mut() else {
            return Err(GitError::Io(io::Error::new(
                io::ErrorKind::NotConnected,
                "conversation is closed",
            )));
        };
        let result = request.write_to(writer);
        self.reader.track(result)
    }

    /// Send a request and decode the response header
    ///
    /// For content requests the reader is left positioned at the payload.
    ///
    /// # Errors
    ///
    /// `NotFound` leaves the conversation usable; anything hard poisons it.
    pub fn request(&mut self, request: Request<'_>) -> Result<CatFileObject> {
        self.send(request)?;
        let object = self.reader.read_header()?;
        if self.expects_payload(request) {
            self.reader.begin_payload(object.size);
        }
        Ok(object)
    }

    fn expects_payload(&self, request: Request<'_>) -> bool {
        match request {
            Request::Contents(_) => true,
            Request::Info(_) => false,
            Request::Legacy(_) => self.legacy_payloads,
        }
    }

    /// The response source
    pub fn reader(&mut self) -> &mut BatchReader {
        &mut self.reader
    }

    /// Close the streams and wait for the process
    ///
    /// Safe to call any number of times.
    pub fn close(&mut self) {
        self.writer.take();
        self.reader.detach();
        if let Some(transport) = self.transport.take() {
            match transport.wait() {
                Ok(exit) if !exit.status.success() => {
                    debug!(command = %self.description, status = %exit.status, stderr = %exit.stderr.trim_end(), "cat-file exited unsuccessfully");
                }
                Ok(_) => debug!(command = %self.description, "closed cat-file conversation"),
                Err(e) => debug!(command = %self.description, error = %e, "cat-file conversation ended"),
            }
        }
    }
}

impl Drop for BatchCommunicator {
    fn drop(&mut self) {
        if self.writer.is_some() && self.reader.pending() > 0 {
            warn!(
                command = %self.description,
                unread = self.reader.pending(),
                "cat-file conversation dropped with an unread response"
            );
        }
        self.close();
    }
}

impl std::fmt::Debug for BatchCommunicator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchCommunicator")
            .field("description", &self.description)
            .field("usable", &self.is_usable())
            .field("reader", &self.reader)
            .finish_non_exhaustive()
    }
}

/// Fail fast if `repo_path` is not something git can operate in
///
/// Starting cat-file in a broken location can block instead of failing.
///
/// # Errors
///
/// `InvalidRepository` with git's diagnostics, or a cancellation error.
pub fn ensure_valid_repository(ctx: &Context, repo_path: &Path, config: &Config) -> Result<()> {
    let invalid = |stderr: String| GitError::InvalidRepository {
        path: repo_path.display().to_string(),
        stderr,
    };
    if !repo_path.is_dir() {
        return Err(invalid("no such directory".to_string()));
    }
    match GitCommand::new(config)
        .arg("rev-parse")
        .dir(repo_path)
        .run_std_string(ctx)
    {
        Ok(_) => Ok(()),
        Err(GitError::CommandFailed { stderr, .. }) => Err(invalid(stderr)),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use similar_asserts::assert_eq;
    use std::io::Cursor;

    const FILE1_BLOB: &str = "e2129701f1a4d54dc44f03c93bca0a2aec7c5449";

    fn fake(responses: &str) -> BatchCommunicator {
        BatchCommunicator::from_parts(
            Cursor::new(responses.as_bytes().to_vec()),
            io::sink(),
            ObjectFormat::Sha1,
        )
    }

    #[test]
    fn test_content_roundtrip_over_fake_peer() {
        let mut comm = fake(&format!("{FILE1_BLOB} blob 6\nfile1\n\n"));
        let obj = comm.request(Request::Contents(FILE1_BLOB)).expect("header");
        assert_eq!(obj.size, 6);
        let mut body = [0u8; 6];
        comm.reader().read_exact(&mut body).expect("payload");
        assert_eq!(&body, b"file1\n");
        // the reader stops at the payload boundary
        let mut more = [0u8; 4];
        assert_eq!(comm.reader().read(&mut more).expect("eof"), 0);
        comm.reader().discard_rest().expect("separator");
        assert!(comm.is_usable());
    }

    #[test]
    fn test_unread_payload_is_drained_before_next_request() {
        let responses = format!("{FILE1_BLOB} blob 6\nfile1\n\n{FILE1_BLOB} blob 6\nfile1\n\n");
        let mut comm = fake(&responses);
        comm.request(Request::Contents(FILE1_BLOB)).expect("first");
        let obj = comm.request(Request::Contents(FILE1_BLOB)).expect("second");
        assert_eq!(obj.size, 6);
        assert_eq!(comm.reader().read_payload().expect("payload"), b"file1\n");
    }

    #[test]
    fn test_short_payload_poisons() {
        let mut comm = fake(&format!("{FILE1_BLOB} blob 10\nfile1\n"));
        comm.request(Request::Contents(FILE1_BLOB)).expect("header");
        let err = comm.reader().read_payload().expect_err("short");
        assert!(matches!(err, GitError::ShortRead { expected: 10, .. }));
        assert!(!comm.is_usable());
        assert!(comm.request(Request::Contents(FILE1_BLOB)).is_err());
    }

    #[test]
    fn test_not_found_keeps_conversation_usable() {
        let missing = "0000000000000000000000000000000000000001";
        let mut comm = fake(&format!("{missing} missing\n{FILE1_BLOB} blob 6\n"));
        let err = comm.request(Request::Info(missing)).expect_err("missing");
        assert!(err.is_not_found());
        assert!(comm.is_usable());
        let obj = comm.request(Request::Info(FILE1_BLOB)).expect("next");
        assert_eq!(obj.id.to_hex(), FILE1_BLOB);
    }

    #[test]
    fn test_close_is_idempotent() {
        let mut comm = fake("");
        comm.close();
        comm.close();
        assert!(!comm.is_usable());
        let err = comm.send(Request::Info("HEAD")).expect_err("closed");
        assert!(err.is_hard());
    }

    #[test]
    fn test_rejected_request_keeps_conversation() {
        let mut comm = fake(&format!("{FILE1_BLOB} blob 6\n"));
        let err = comm
            .request(Request::Info("HEAD\nHEAD"))
            .expect_err("newline");
        assert!(matches!(err, GitError::InvalidArgument { .. }));
        assert!(comm.is_usable());
        let obj = comm.request(Request::Info(FILE1_BLOB)).expect("header");
        assert_eq!(obj.size, 6);
    }

    #[test]
    fn test_decode_helper_without_payload_is_rejected() {
        let mut comm = fake("");
        assert!(matches!(
            comm.reader().read_payload(),
            Err(GitError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn test_invalid_repository_rejected() {
        let ctx = Context::new();
        let missing = std::env::temp_dir().join("gitcat-definitely-missing-dir");
        let err = ensure_valid_repository(&ctx, &missing, &Config::default())
            .expect_err("missing directory");
        assert!(matches!(err, GitError::InvalidRepository { .. }));
    }
}

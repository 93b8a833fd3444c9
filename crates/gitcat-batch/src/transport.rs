// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Supervised git subprocesses
//!
//! A [`Transport`] spawns one git process and hands out its stdin and
//! stdout. A watcher thread owns the child: when the context is cancelled
//! or the command timeout passes it records the cause and kills the
//! process, which closes the pipes and unblocks any pending read or write.
//! The stream wrappers turn the resulting EOF or pipe error into an I/O
//! error that carries the cause, so it converts back into
//! `GitError::Cancelled` or `GitError::TimedOut`.

use std::io::{self, Read, Write};
use std::process::{Child, ChildStderr, ChildStdin, ChildStdout, ExitStatus};
use std::sync::{Arc, OnceLock};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::Sender;
use tracing::{debug, warn};

use crate::command::GitCommand;
use crate::context::{CancelCause, Context};
use crate::error::{GitError, Result};

/// How long a process may take to exit on its own after its pipes close
const EXIT_GRACE: Duration = Duration::from_secs(5);

/// Captured stderr is truncated to this many bytes
const STDERR_LIMIT: usize = 64 * 1024;

/// Commands slower than this are logged
const SLOW_COMMAND: Duration = Duration::from_secs(1);

type CauseCell = Arc<OnceLock<CancelCause>>;

/// Exit status and diagnostics of a finished process
#[derive(Debug)]
pub struct TransportExit {
    /// Exit status
    pub status: ExitStatus,
    /// Captured standard error (truncated)
    pub stderr: String,
}

/// A running git process with supervised cancellation
pub struct Transport {
    stdin: Option<ChildStdin>,
    stdout: Option<ChildStdout>,
    description: String,
    cause: CauseCell,
    shutdown: Option<Sender<()>>,
    watcher: Option<JoinHandle<io::Result<ExitStatus>>>,
    stderr: Option<JoinHandle<String>>,
    started: Instant,
}

impl Transport {
    /// Spawn `cmd` under `ctx`
    ///
    /// The command's timeout, if any, is enforced by the watcher alongside
    /// the context.
    ///
    /// # Errors
    ///
    /// Returns an error if the command is broken, the context is already
    /// done, or the process cannot be started.
    pub fn spawn(cmd: &GitCommand, ctx: &Context) -> Result<Self> {
        ctx.check()?;
        let description = cmd.description();
        let mut command = cmd.to_command()?;
        debug!(command = %description, "starting git command");

        let mut child = command.spawn().map_err(GitError::Io)?;
        let stdin = child.stdin.take();
        let stdout = child.stdout.take();
        let stderr = child.stderr.take().map(spawn_stderr_reader);

        let cause: CauseCell = Arc::new(OnceLock::new());
        let (shutdown, shutdown_rx) = crossbeam_channel::bounded::<()>(0);
        let limit = cmd.timeout_limit().map(|t| Instant::now() + t);
        let watcher = {
            let ctx = ctx.clone();
            let cause = Arc::clone(&cause);
            let description = description.clone();
            thread::Builder::new()
                .name("gitcat-watch".to_string())
                .spawn(move || {
                    match ctx.wait(&shutdown_rx, limit) {
                        Some(reason) => {
                            let _ = cause.set(reason);
                            debug!(command = %description, cause = %reason, "killing git process");
                            let _ = child.kill();
                            child.wait()
                        }
                        None => wait_with_grace(&mut child, &description),
                    }
                })
                .map_err(GitError::Io)?
        };

        Ok(Self {
            stdin,
            stdout,
            description,
            cause,
            shutdown: Some(shutdown),
            watcher: Some(watcher),
            stderr,
            started: Instant::now(),
        })
    }

    /// Take the request sink
    pub fn take_stdin(&mut self) -> Option<CancelAwareWriter<ChildStdin>> {
        self.stdin
            .take()
            .map(|inner| CancelAwareWriter::new(inner, Arc::clone(&self.cause)))
    }

    /// Take the response source
    pub fn take_stdout(&mut self) -> Option<CancelAwareReader<ChildStdout>> {
        self.stdout
            .take()
            .map(|inner| CancelAwareReader::new(inner, Arc::clone(&self.cause)))
    }

    /// Sanitized description for logs
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Why the watcher stopped the process, if it did
    #[must_use]
    pub fn cause(&self) -> Option<CancelCause> {
        self.cause.get().copied()
    }

    /// Close the pipes and wait for the process to exit
    ///
    /// # Errors
    ///
    /// Returns `GitError::Cancelled` / `GitError::TimedOut` if the watcher
    /// killed the process, or an I/O error if waiting failed.
    pub fn wait(mut self) -> Result<TransportExit> {
        let status = self.finish();
        let stderr = self
            .stderr
            .take()
            .and_then(|h| h.join().ok())
            .unwrap_or_default();

        let elapsed = self.started.elapsed();
        if elapsed > SLOW_COMMAND {
            debug!(command = %self.description, ?elapsed, "slow git command");
        }

        if let Some(cause) = self.cause() {
            return Err(cause.into());
        }
        let status = status.ok_or_else(|| {
            GitError::Io(io::Error::other("git process watcher exited abnormally"))
        })??;
        Ok(TransportExit { status, stderr })
    }

    fn finish(&mut self) -> Option<io::Result<ExitStatus>> {
        self.stdin.take();
        self.stdout.take();
        self.shutdown.take();
        self.watcher.take().and_then(|h| h.join().ok())
    }
}

impl Drop for Transport {
    fn drop(&mut self) {
        let _ = self.finish();
        if let Some(handle) = self.stderr.take() {
            let _ = handle.join();
        }
    }
}

impl std::fmt::Debug for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transport")
            .field("description", &self.description)
            .field("cause", &self.cause())
            .finish_non_exhaustive()
    }
}

fn wait_with_grace(child: &mut Child, description: &str) -> io::Result<ExitStatus> {
    let give_up = Instant::now() + EXIT_GRACE;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(status);
        }
        if Instant::now() >= give_up {
            warn!(command = %description, "git process did not exit after its pipes closed, killing");
            let _ = child.kill();
            return child.wait();
        }
        thread::sleep(Duration::from_millis(5));
    }
}

fn spawn_stderr_reader(mut stderr: ChildStderr) -> JoinHandle<String> {
    thread::spawn(move || {
        let mut kept = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            match stderr.read(&mut chunk) {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    let room = STDERR_LIMIT.saturating_sub(kept.len());
                    kept.extend_from_slice(&chunk[..n.min(room)]);
                }
            }
        }
        String::from_utf8_lossy(&kept).into_owned()
    })
}

fn with_cause(err: io::Error, cause: &CauseCell) -> io::Error {
    match cause.get() {
        Some(reason) => io::Error::new(err.kind(), *reason),
        None => err,
    }
}

/// Reader that reports cancellation instead of a bare EOF
#[derive(Debug)]
pub struct CancelAwareReader<R> {
    inner: R,
    cause: CauseCell,
}

impl<R> CancelAwareReader<R> {
    fn new(inner: R, cause: CauseCell) -> Self {
        Self { inner, cause }
    }
}

impl<R: Read> Read for CancelAwareReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.inner.read(buf) {
            Ok(0) if !buf.is_empty() => match self.cause.get() {
                Some(reason) => Err(io::Error::new(io::ErrorKind::UnexpectedEof, *reason)),
                None => Ok(0),
            },
            Ok(n) => Ok(n),
            Err(e) => Err(with_cause(e, &self.cause)),
        }
    }
}

/// Writer that reports cancellation instead of a bare broken pipe
#[derive(Debug)]
pub struct CancelAwareWriter<W> {
    inner: W,
    cause: CauseCell,
}

impl<W> CancelAwareWriter<W> {
    fn new(inner: W, cause: CauseCell) -> Self {
        Self { inner, cause }
    }
}

impl<W: Write> Write for CancelAwareWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write(buf).map_err(|e| with_cause(e, &self.cause))
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush().map_err(|e| with_cause(e, &self.cause))
    }
}

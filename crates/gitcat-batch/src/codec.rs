// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Wire codec for the `git cat-file` batch protocols
//!
//! Requests are single lines. Every response starts with a header line
//! `<hex-id> <type> <size>\n`, followed by exactly `size` payload bytes
//! (content requests only) and one `\n` separator. A missing object is
//! reported as `<requested> missing\n` with no payload.
//!
//! Every helper here consumes exactly the bytes it accounts for. Leaving a
//! byte behind, or eating one too many, desynchronizes every later
//! response on the same stream.

use std::fmt;
use std::io::{self, BufRead, Read, Write};

use serde::{Serialize, Serializer};

use crate::error::{GitError, Result};
use crate::object_id::{ObjectFormat, ObjectId};

/// Longest header line accepted before the stream is declared corrupt
pub const MAX_HEADER_LINE: u64 = 64 * 1024;

/// Largest count handed to a single discard step
pub const MAX_SINGLE_DISCARD: u64 = i32::MAX as u64;

/// A request line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request<'a> {
    /// Bare identifier, for the dedicated `--batch` / `--batch-check` processes
    Legacy(&'a str),
    /// `info <id>` on a `--batch-command` process
    Info(&'a str),
    /// `contents <id>` on a `--batch-command` process
    Contents(&'a str),
}

impl Request<'_> {
    /// The requested identifier
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Legacy(id) | Self::Info(id) | Self::Contents(id) => id,
        }
    }

    /// Encode as a newline-terminated request line
    ///
    /// # Errors
    ///
    /// Returns `GitError::InvalidArgument` if the identifier is empty or
    /// contains a newline, which would inject a second request.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let id = self.id();
        if id.is_empty() || id.contains(['\n', '\0']) {
            return Err(GitError::InvalidArgument { arg: id.to_string() });
        }
        let verb = match self {
            Self::Legacy(_) => "",
            Self::Info(_) => "info ",
            Self::Contents(_) => "contents ",
        };
        let mut line = Vec::with_capacity(verb.len() + id.len() + 1);
        line.extend_from_slice(verb.as_bytes());
        line.extend_from_slice(id.as_bytes());
        line.push(b'\n');
        Ok(line)
    }

    /// Write the request and flush
    ///
    /// # Errors
    ///
    /// Returns an encoding error or the underlying write error.
    pub fn write_to<W: Write>(&self, w: &mut W) -> Result<()> {
        let line = self.encode()?;
        w.write_all(&line)?;
        w.flush()?;
        Ok(())
    }
}

/// Object type as reported in a header line
///
/// Unknown types are passed through untouched.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ObjectType {
    /// `commit`
    Commit,
    /// `tree`
    Tree,
    /// `blob`
    Blob,
    /// `tag`
    Tag,
    /// Anything else
    Other(String),
}

impl ObjectType {
    /// The type name as git prints it
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Commit => "commit",
            Self::Tree => "tree",
            Self::Blob => "blob",
            Self::Tag => "tag",
            Self::Other(name) => name,
        }
    }
}

impl From<&str> for ObjectType {
    fn from(name: &str) -> Self {
        match name {
            "commit" => Self::Commit,
            "tree" => Self::Tree,
            "blob" => Self::Blob,
            "tag" => Self::Tag,
            other => Self::Other(other.to_string()),
        }
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ObjectType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// A decoded response header
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatFileObject {
    /// Resolved object id
    pub id: ObjectId,
    /// Object type
    #[serde(rename = "type")]
    pub kind: ObjectType,
    /// Number of payload bytes that follow a content response
    pub size: u64,
}

/// Read one response header
///
/// A line consisting of a lone `\n` is skipped once before the real header.
/// A missing or ambiguous object, or any other `<name> <status>` line, yields
/// `GitError::NotFound` and leaves the stream positioned at the next
/// response. Any other failure is hard.
///
/// # Errors
///
/// `NotFound`, `MalformedResponse`, or an I/O error.
pub fn read_batch_line<R: BufRead>(rd: &mut R, format: ObjectFormat) -> Result<CatFileObject> {
    let mut line = read_header_line(rd)?;
    if line.len() == 1 {
        line = read_header_line(rd)?;
    }
    parse_header(&line, format)
}

fn read_header_line<R: BufRead>(rd: &mut R) -> Result<Vec<u8>> {
    let mut line = Vec::with_capacity(128);
    let n = rd.by_ref().take(MAX_HEADER_LINE).read_until(b'\n', &mut line)?;
    if n == 0 {
        return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "cat-file stream closed").into());
    }
    if line.last() != Some(&b'\n') {
        let reason = if n as u64 >= MAX_HEADER_LINE {
            "header line too long"
        } else {
            "unterminated header line"
        };
        return Err(GitError::malformed(&line, reason));
    }
    Ok(line)
}

/// Parse a header line (including its trailing `\n`)
///
/// A line with a single space after the name is a status line, so
/// `<name> missing`, `<name> ambiguous` and `<name> submodule` are all
/// `NotFound`.
///
/// # Errors
///
/// `NotFound` for status lines, `MalformedResponse` otherwise.
pub fn parse_header(line: &[u8], format: ObjectFormat) -> Result<CatFileObject> {
    let body = line.strip_suffix(b"\n").unwrap_or(line);
    for status in [&b" missing"[..], &b" ambiguous"[..]] {
        if let Some(requested) = body.strip_suffix(status) {
            return Err(GitError::NotFound {
                id: String::from_utf8_lossy(requested).into_owned(),
            });
        }
    }

    let text = std::str::from_utf8(body).map_err(|_| GitError::malformed(line, "not utf-8"))?;
    let Some((hex, rest)) = text.split_once(' ') else {
        return Err(GitError::malformed(line, "missing object type"));
    };
    // `<name> <status>`: any other status token git reports, e.g. `submodule`
    let Some((kind, size)) = rest.split_once(' ') else {
        return Err(GitError::NotFound { id: hex.to_string() });
    };
    let id = format
        .id_from_hex(hex)
        .map_err(|_| GitError::malformed(line, "invalid object id"))?;
    let size = size
        .parse::<u64>()
        .map_err(|_| GitError::malformed(line, "invalid object size"))?;
    Ok(CatFileObject {
        id,
        kind: ObjectType::from(kind),
        size,
    })
}

/// Format a header line the way git does
#[must_use]
pub fn encode_header(object: &CatFileObject) -> String {
    format!("{} {} {}\n", object.id, object.kind, object.size)
}

/// Discard `n` bytes in steps of at most `max_single`
///
/// # Errors
///
/// Returns `ShortRead` if the source ends early, or the first I/O error.
pub fn discard_with_limit<R: BufRead>(rd: &mut R, n: u64, max_single: u64) -> Result<()> {
    let max_single = max_single.max(1);
    let mut remaining = n;
    while remaining > 0 {
        let step = remaining.min(max_single);
        let got = discard_step(rd, step)?;
        remaining -= got;
        if got < step {
            return Err(GitError::ShortRead {
                expected: n,
                actual: n - remaining,
            });
        }
    }
    Ok(())
}

fn discard_step<R: BufRead>(rd: &mut R, n: u64) -> Result<u64> {
    let mut done = 0u64;
    while done < n {
        let available = match rd.fill_buf() {
            Ok(buf) => buf.len() as u64,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };
        if available == 0 {
            break;
        }
        let take = available.min(n - done);
        // `take` never exceeds the buffered length, which is a usize
        rd.consume(take as usize);
        done += take;
    }
    Ok(done)
}

/// Discard `n` bytes
///
/// # Errors
///
/// See [`discard_with_limit`].
pub fn discard_full<R: BufRead>(rd: &mut R, n: u64) -> Result<()> {
    discard_with_limit(rd, n, MAX_SINGLE_DISCARD)
}

/// Consume the `\n` that terminates every payload
///
/// # Errors
///
/// `ShortRead` at end of stream, `MalformedResponse` for any other byte.
pub fn discard_separator<R: BufRead>(rd: &mut R) -> Result<()> {
    let mut byte = [0u8; 1];
    match rd.read(&mut byte)? {
        0 => Err(GitError::ShortRead {
            expected: 1,
            actual: 0,
        }),
        _ if byte[0] == b'\n' => Ok(()),
        _ => Err(GitError::malformed(&byte, "missing record separator")),
    }
}

/// Read a whole payload of `size` bytes plus its separator
///
/// # Errors
///
/// `ShortRead` if fewer than `size` bytes arrive.
pub fn read_payload<R: BufRead>(rd: &mut R, size: u64) -> Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(usize::try_from(size.min(1 << 20)).unwrap_or(0));
    let got = rd.by_ref().take(size).read_to_end(&mut buf)? as u64;
    if got < size {
        return Err(GitError::ShortRead {
            expected: size,
            actual: got,
        });
    }
    discard_separator(rd)?;
    Ok(buf)
}

/// Find `field` in the header block of a `size`-byte payload, then discard
/// the rest of the payload and its separator
///
/// Scanning stops at the first blank line. The payload is fully consumed
/// even when the field is absent.
///
/// # Errors
///
/// `MissingField` if no header line starts with `field`, or a hard stream
/// error.
pub fn read_field_and_discard<R: BufRead>(rd: &mut R, field: &str, size: u64) -> Result<String> {
    let mut consumed = 0u64;
    let mut value = None;
    let mut line = Vec::with_capacity(128);
    while consumed < size {
        line.clear();
        let limit = (size - consumed).min(MAX_HEADER_LINE);
        let n = rd.by_ref().take(limit).read_until(b'\n', &mut line)? as u64;
        if n == 0 {
            return Err(GitError::ShortRead {
                expected: size,
                actual: consumed,
            });
        }
        consumed += n;
        if line == b"\n" {
            break;
        }
        let Some(rest) = line
            .strip_prefix(field.as_bytes())
            .and_then(|r| r.strip_prefix(b" "))
        else {
            continue;
        };
        let rest = rest.strip_suffix(b"\n").unwrap_or(rest);
        value = Some(String::from_utf8_lossy(rest).into_owned());
        break;
    }

    discard_full(rd, size - consumed)?;
    discard_separator(rd)?;
    value.ok_or_else(|| GitError::MissingField {
        field: field.to_string(),
    })
}

/// Pull the `tree` id out of a commit payload
///
/// # Errors
///
/// See [`read_field_and_discard`].
pub fn read_tree_id<R: BufRead>(rd: &mut R, format: ObjectFormat, size: u64) -> Result<ObjectId> {
    let hex = read_field_and_discard(rd, "tree", size)?;
    format.id_from_hex(&hex)
}

/// Pull the `object` id out of a tag payload
///
/// # Errors
///
/// See [`read_field_and_discard`].
pub fn read_tag_object_id<R: BufRead>(
    rd: &mut R,
    format: ObjectFormat,
    size: u64,
) -> Result<ObjectId> {
    let hex = read_field_and_discard(rd, "object", size)?;
    format.id_from_hex(&hex)
}

/// Mode of a tree entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryMode {
    /// `100644`
    Blob,
    /// `100755`
    Executable,
    /// `120000`
    Symlink,
    /// `160000`, a submodule commit
    Commit,
    /// `40000`
    Tree,
}

impl EntryMode {
    /// Match an ASCII octal mode
    #[must_use]
    pub fn parse(mode: &[u8]) -> Option<Self> {
        match mode {
            b"100644" => Some(Self::Blob),
            b"100755" => Some(Self::Executable),
            b"120000" => Some(Self::Symlink),
            b"160000" => Some(Self::Commit),
            b"40000" | b"040000" | b"40755" | b"040755" => Some(Self::Tree),
            _ => None,
        }
    }

    /// Canonical octal representation
    #[must_use]
    pub fn as_octal(self) -> &'static str {
        match self {
            Self::Blob => "100644",
            Self::Executable => "100755",
            Self::Symlink => "120000",
            Self::Commit => "160000",
            Self::Tree => "40000",
        }
    }

    /// Whether the entry is a subtree
    #[must_use]
    pub fn is_tree(self) -> bool {
        self == Self::Tree
    }

    /// Whether the entry points at a submodule commit
    #[must_use]
    pub fn is_submodule(self) -> bool {
        self == Self::Commit
    }
}

/// One record of a tree payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TreeEntry {
    /// Entry mode
    pub mode: EntryMode,
    /// File name (lossily decoded)
    pub name: String,
    /// Id of the blob, tree or commit
    pub id: ObjectId,
}

/// Decode every record of a `size`-byte tree payload and its separator
///
/// The hash width comes from `format`. An unrecognized mode is reported
/// only after the payload has been consumed, so the stream stays usable.
///
/// # Errors
///
/// `UnsupportedMode`, `TruncatedEntry` for a record whose hash overruns
/// the payload (both leave the stream in sync), or a hard error.
pub fn read_tree_entries<R: BufRead>(
    rd: &mut R,
    format: ObjectFormat,
    size: u64,
) -> Result<Vec<TreeEntry>> {
    let mut entries = Vec::new();
    let mut unsupported = None;
    let mut consumed = 0u64;
    let mut mode = Vec::with_capacity(8);
    let mut name = Vec::with_capacity(64);
    let mut raw = vec![0u8; format.raw_len()];

    while consumed < size {
        mode.clear();
        consumed += read_delimited(rd, b' ', size - consumed, &mut mode, "tree entry mode")?;
        name.clear();
        consumed += read_delimited(rd, 0, size - consumed, &mut name, "tree entry name")?;

        let hash_len = raw.len() as u64;
        if size - consumed < hash_len {
            discard_full(rd, size - consumed)?;
            discard_separator(rd)?;
            return Err(GitError::TruncatedEntry {
                name: String::from_utf8_lossy(&name[..name.len() - 1]).into_owned(),
            });
        }
        rd.read_exact(&mut raw).map_err(|e| match e.kind() {
            io::ErrorKind::UnexpectedEof => GitError::ShortRead {
                expected: size,
                actual: consumed,
            },
            _ => GitError::from(e),
        })?;
        consumed += hash_len;

        let mode_bytes = &mode[..mode.len() - 1];
        match EntryMode::parse(mode_bytes) {
            Some(entry_mode) => entries.push(TreeEntry {
                mode: entry_mode,
                name: String::from_utf8_lossy(&name[..name.len() - 1]).into_owned(),
                id: format.id_from_raw(&raw)?,
            }),
            None => {
                if unsupported.is_none() {
                    unsupported = Some(String::from_utf8_lossy(mode_bytes).into_owned());
                }
            }
        }
    }
    discard_separator(rd)?;

    match unsupported {
        Some(mode) => Err(GitError::UnsupportedMode { mode }),
        None => Ok(entries),
    }
}

/// Read up to and including `delim`, never past `limit` bytes
fn read_delimited<R: BufRead>(
    rd: &mut R,
    delim: u8,
    limit: u64,
    out: &mut Vec<u8>,
    what: &'static str,
) -> Result<u64> {
    let n = rd.by_ref().take(limit).read_until(delim, out)? as u64;
    if out.last() == Some(&delim) {
        return Ok(n);
    }
    if n < limit {
        return Err(GitError::ShortRead {
            expected: limit,
            actual: n,
        });
    }
    Err(GitError::malformed(out, what))
}

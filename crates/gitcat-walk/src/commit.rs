// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Commit payload parsing

use std::fmt;

use chrono::{DateTime, FixedOffset};
use gitcat_batch::{CatFileBatch, ObjectId, ObjectType};
use serde::Serialize;

use crate::error::{Result, WalkError};

/// Author, committer or tagger line
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Signature {
    /// Display name
    pub name: String,
    /// Email address, without the angle brackets
    pub email: String,
    /// Timestamp in the signer's own offset
    pub when: DateTime<FixedOffset>,
}

impl Signature {
    /// Parse `Name <email> 1700000000 +0100`
    #[must_use]
    pub fn parse(line: &str) -> Option<Self> {
        let open = line.find('<')?;
        let close = line.rfind('>')?;
        if close < open {
            return None;
        }
        let name = line[..open].trim().to_string();
        let email = line[open + 1..close].to_string();

        let mut fields = line[close + 1..].split_whitespace();
        let seconds: i64 = fields.next()?.parse().ok()?;
        let offset = parse_offset(fields.next()?)?;
        let when = DateTime::from_timestamp(seconds, 0)?.with_timezone(&offset);
        Some(Self { name, email, when })
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} <{}> {} {}",
            self.name,
            self.email,
            self.when.timestamp(),
            self.when.format("%z")
        )
    }
}

/// `+hhmm` / `-hhmm`
fn parse_offset(tz: &str) -> Option<FixedOffset> {
    let (sign, digits) = match tz.as_bytes().first()? {
        b'+' => (1, &tz[1..]),
        b'-' => (-1, &tz[1..]),
        _ => return None,
    };
    if digits.len() != 4 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let hours: i32 = digits[..2].parse().ok()?;
    let minutes: i32 = digits[2..].parse().ok()?;
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

/// Header lines and message of a commit or tag payload
pub(crate) struct ObjectText<'a> {
    pub headers: Vec<(&'a str, String)>,
    pub message: &'a str,
}

impl ObjectText<'_> {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Split a payload at its first blank line
///
/// Continuation lines start with a single space and are appended to the
/// previous header, joined by `\n`.
pub(crate) fn split_object(text: &str) -> ObjectText<'_> {
    let mut headers: Vec<(&str, String)> = Vec::new();
    let mut rest = text;
    while !rest.is_empty() {
        let (line, tail) = rest.split_once('\n').unwrap_or((rest, ""));
        rest = tail;
        if line.is_empty() {
            return ObjectText {
                headers,
                message: rest,
            };
        }
        match line.strip_prefix(' ') {
            Some(continuation) => {
                if let Some((_, value)) = headers.last_mut() {
                    value.push('\n');
                    value.push_str(continuation);
                }
            }
            None => {
                let (key, value) = line.split_once(' ').unwrap_or((line, ""));
                headers.push((key, value.to_string()));
            }
        }
    }
    ObjectText {
        headers,
        message: "",
    }
}

/// A parsed commit
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Commit {
    /// Id of the commit itself
    pub id: ObjectId,
    /// Root tree
    pub tree: ObjectId,
    /// Parents in recorded order
    pub parents: Vec<ObjectId>,
    /// Author
    pub author: Signature,
    /// Committer
    pub committer: Signature,
    /// Signature block, continuation lines rejoined
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gpgsig: Option<String>,
    /// Everything after the header block
    pub message: String,
}

impl Commit {
    /// Parse a commit payload
    ///
    /// Unknown headers are ignored. Ids are decoded in the format of `id`.
    ///
    /// # Errors
    ///
    /// `InvalidObject` when `tree`, `author` or `committer` is missing or
    /// unparseable.
    pub fn parse(id: ObjectId, payload: &[u8]) -> Result<Self> {
        let text = String::from_utf8_lossy(payload);
        let object = split_object(&text);
        let format = id.format();

        let mut tree = None;
        let mut parents = Vec::new();
        let mut author = None;
        let mut committer = None;
        let mut gpgsig = None;

        for (key, value) in &object.headers {
            match *key {
                "tree" => tree = Some(format.id_from_hex(value)?),
                "parent" => parents.push(format.id_from_hex(value)?),
                "author" => {
                    author = Some(
                        Signature::parse(value)
                            .ok_or_else(|| WalkError::invalid(id, "malformed author"))?,
                    );
                }
                "committer" => {
                    committer = Some(
                        Signature::parse(value)
                            .ok_or_else(|| WalkError::invalid(id, "malformed committer"))?,
                    );
                }
                "gpgsig" | "gpgsig-sha256" => gpgsig = Some(value.clone()),
                _ => {}
            }
        }

        Ok(Self {
            id,
            tree: tree.ok_or_else(|| WalkError::invalid(id, "missing tree"))?,
            parents,
            author: author.ok_or_else(|| WalkError::invalid(id, "missing author"))?,
            committer: committer.ok_or_else(|| WalkError::invalid(id, "missing committer"))?,
            gpgsig,
            message: object.message.to_string(),
        })
    }

    /// First line of the message
    #[must_use]
    pub fn summary(&self) -> &str {
        self.message.lines().next().unwrap_or("")
    }

    /// Whether the commit has more than one parent
    #[must_use]
    pub fn is_merge(&self) -> bool {
        self.parents.len() > 1
    }

    /// Whether the commit has no parents
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.parents.is_empty()
    }

    /// Committer timestamp in seconds, the walk ordering key
    #[must_use]
    pub fn time(&self) -> i64 {
        self.committer.when.timestamp()
    }
}

/// Read and parse the commit `rev` resolves to
///
/// # Errors
///
/// `TypeMismatch` if `rev` is not a commit, or any batch error.
pub fn read_commit(batch: &mut dyn CatFileBatch, rev: &str) -> Result<Commit> {
    let (object, reader) = batch.query_content(rev)?;
    if object.kind != ObjectType::Commit {
        reader.discard_rest()?;
        return Err(WalkError::TypeMismatch {
            expected: "commit",
            actual: object.kind.to_string(),
        });
    }
    let payload = reader.read_payload()?;
    Commit::parse(object.id, &payload)
}

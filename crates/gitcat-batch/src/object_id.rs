// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Object identifiers and hash-algorithm descriptions
//!
//! A repository uses exactly one [`ObjectFormat`] (sha1 or sha256). The
//! format is detected once when a repository is opened and then passed to
//! every decoder that needs to know how wide an identifier is.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::GitError;

/// Raw width of a sha1 object id
pub const SHA1_RAW_LEN: usize = 20;

/// Raw width of a sha256 object id
pub const SHA256_RAW_LEN: usize = 32;

const SHA1_EMPTY_TREE: [u8; SHA1_RAW_LEN] = decode_hex("4b825dc642cb6eb9a060e54bf8d69288fbee4904");
const SHA256_EMPTY_TREE: [u8; SHA256_RAW_LEN] =
    decode_hex("6ef19b41225c5369f1c104d45d8d85efa9b057b53b14b4b9b939dd74decc5321");

/// Hash algorithm used by a repository
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectFormat {
    /// 20-byte ids, 40 hex characters
    #[default]
    Sha1,
    /// 32-byte ids, 64 hex characters
    Sha256,
}

impl ObjectFormat {
    /// Name as printed by `git rev-parse --show-object-format`
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Sha1 => "sha1",
            Self::Sha256 => "sha256",
        }
    }

    /// Look up a format by its git name
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim() {
            "sha1" => Some(Self::Sha1),
            "sha256" => Some(Self::Sha256),
            _ => None,
        }
    }

    /// Width of a raw (binary) id in bytes
    #[must_use]
    pub fn raw_len(self) -> usize {
        match self {
            Self::Sha1 => SHA1_RAW_LEN,
            Self::Sha256 => SHA256_RAW_LEN,
        }
    }

    /// Width of a hex id in characters
    #[must_use]
    pub fn full_length(self) -> usize {
        self.raw_len() * 2
    }

    /// The all-zero id, used by git to mean "no object"
    #[must_use]
    pub fn empty_object_id(self) -> ObjectId {
        match self {
            Self::Sha1 => ObjectId::Sha1([0; SHA1_RAW_LEN]),
            Self::Sha256 => ObjectId::Sha256([0; SHA256_RAW_LEN]),
        }
    }

    /// Id of the tree with no entries
    #[must_use]
    pub fn empty_tree_id(self) -> ObjectId {
        match self {
            Self::Sha1 => ObjectId::Sha1(SHA1_EMPTY_TREE),
            Self::Sha256 => ObjectId::Sha256(SHA256_EMPTY_TREE),
        }
    }

    /// Build an id from raw hash bytes
    ///
    /// # Errors
    ///
    /// Returns `GitError::InvalidObjectId` if `raw` is not exactly
    /// [`raw_len`](Self::raw_len) bytes long.
    pub fn id_from_raw(self, raw: &[u8]) -> Result<ObjectId, GitError> {
        let invalid = || GitError::InvalidObjectId {
            value: encode_hex(raw),
        };
        match self {
            Self::Sha1 => raw.try_into().map(ObjectId::Sha1).map_err(|_| invalid()),
            Self::Sha256 => raw.try_into().map(ObjectId::Sha256).map_err(|_| invalid()),
        }
    }

    /// Parse a hex id of this format
    ///
    /// # Errors
    ///
    /// Returns `GitError::InvalidObjectId` if the string has the wrong
    /// length or contains non-hex characters.
    pub fn id_from_hex(self, hex: &str) -> Result<ObjectId, GitError> {
        if hex.len() != self.full_length() {
            return Err(GitError::InvalidObjectId {
                value: hex.to_string(),
            });
        }
        let mut raw = [0u8; SHA256_RAW_LEN];
        for (i, pair) in hex.as_bytes().chunks_exact(2).enumerate() {
            let (Some(high), Some(low)) = (hex_value(pair[0]), hex_value(pair[1])) else {
                return Err(GitError::InvalidObjectId {
                    value: hex.to_string(),
                });
            };
            raw[i] = (high << 4) | low;
        }
        self.id_from_raw(&raw[..self.raw_len()])
    }
}

impl fmt::Display for ObjectFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A git object id in either hash format
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ObjectId {
    /// sha1 id
    Sha1([u8; SHA1_RAW_LEN]),
    /// sha256 id
    Sha256([u8; SHA256_RAW_LEN]),
}

impl ObjectId {
    /// Parse a hex id, inferring the format from its length
    ///
    /// # Errors
    ///
    /// Returns `GitError::InvalidObjectId` for anything that is not 40 or
    /// 64 hex characters.
    pub fn from_hex(hex: &str) -> Result<Self, GitError> {
        let format = if hex.len() == ObjectFormat::Sha256.full_length() {
            ObjectFormat::Sha256
        } else {
            ObjectFormat::Sha1
        };
        format.id_from_hex(hex)
    }

    /// The hash format of this id
    #[must_use]
    pub fn format(&self) -> ObjectFormat {
        match self {
            Self::Sha1(_) => ObjectFormat::Sha1,
            Self::Sha256(_) => ObjectFormat::Sha256,
        }
    }

    /// Raw hash bytes
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Sha1(raw) => raw,
            Self::Sha256(raw) => raw,
        }
    }

    /// Lowercase hex representation
    #[must_use]
    pub fn to_hex(&self) -> String {
        encode_hex(self.as_bytes())
    }

    /// First seven hex characters, for display
    #[must_use]
    pub fn short(&self) -> String {
        let mut hex = self.to_hex();
        hex.truncate(7);
        hex
    }

    /// Whether this is the all-zero id
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.as_bytes().iter().all(|&b| b == 0)
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({})", self.short())
    }
}

impl FromStr for ObjectId {
    type Err = GitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl Serialize for ObjectId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ObjectId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let hex = String::deserialize(deserializer)?;
        Self::from_hex(&hex).map_err(serde::de::Error::custom)
    }
}

const HEX_CHARS: &[u8; 16] = b"0123456789abcdef";

fn encode_hex(raw: &[u8]) -> String {
    let mut hex = String::with_capacity(raw.len() * 2);
    for byte in raw {
        hex.push(HEX_CHARS[(byte >> 4) as usize] as char);
        hex.push(HEX_CHARS[(byte & 0x0f) as usize] as char);
    }
    hex
}

const fn hex_value(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

const fn decode_hex<const N: usize>(hex: &str) -> [u8; N] {
    let bytes = hex.as_bytes();
    assert!(bytes.len() == N * 2, "hex constant has the wrong length");
    let mut out = [0u8; N];
    let mut i = 0;
    while i < N {
        let (Some(high), Some(low)) = (hex_value(bytes[2 * i]), hex_value(bytes[2 * i + 1])) else {
            panic!("hex constant contains a non-hex character");
        };
        out[i] = (high << 4) | low;
        i += 1;
    }
    out
}

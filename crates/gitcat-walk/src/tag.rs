// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Annotated tag payload parsing

use gitcat_batch::{CatFileBatch, ObjectId, ObjectType};
use serde::Serialize;

use crate::commit::{Signature, split_object};
use crate::error::{Result, WalkError};

const SIGNATURE_MARKERS: [&str; 2] = [
    "-----BEGIN PGP SIGNATURE-----",
    "-----BEGIN SSH SIGNATURE-----",
];

/// A parsed annotated tag
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Tag {
    /// Id of the tag object
    pub id: ObjectId,
    /// The tagged object
    pub object: ObjectId,
    /// Type of the tagged object
    pub target_type: ObjectType,
    /// Tag name
    pub name: String,
    /// Tagger; very old tags have none
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tagger: Option<Signature>,
    /// Message without the trailing signature
    pub message: String,
    /// Armored signature split off the end of the message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

impl Tag {
    /// Parse a tag payload
    ///
    /// # Errors
    ///
    /// `InvalidObject` when `object`, `type` or `tag` is missing, or the
    /// tagger line is malformed.
    pub fn parse(id: ObjectId, payload: &[u8]) -> Result<Self> {
        let text = String::from_utf8_lossy(payload);
        let parsed = split_object(&text);

        let object = parsed
            .get("object")
            .ok_or_else(|| WalkError::invalid(id, "missing object"))?;
        let object = id.format().id_from_hex(object)?;
        let target_type = parsed
            .get("type")
            .map(ObjectType::from)
            .ok_or_else(|| WalkError::invalid(id, "missing type"))?;
        let name = parsed
            .get("tag")
            .ok_or_else(|| WalkError::invalid(id, "missing tag name"))?
            .to_string();
        let tagger = match parsed.get("tagger") {
            Some(line) => Some(
                Signature::parse(line).ok_or_else(|| WalkError::invalid(id, "malformed tagger"))?,
            ),
            None => None,
        };

        let (message, signature) = split_signature(parsed.message);
        Ok(Self {
            id,
            object,
            target_type,
            name,
            tagger,
            message: message.to_string(),
            signature: signature.map(str::to_string),
        })
    }

    /// First line of the message
    #[must_use]
    pub fn summary(&self) -> &str {
        self.message.lines().next().unwrap_or("")
    }
}

fn split_signature(message: &str) -> (&str, Option<&str>) {
    let start = SIGNATURE_MARKERS
        .iter()
        .filter_map(|marker| {
            message
                .match_indices(marker)
                .map(|(i, _)| i)
                .find(|&i| i == 0 || message.as_bytes()[i - 1] == b'\n')
        })
        .min();
    match start {
        Some(i) => (&message[..i], Some(&message[i..])),
        None => (message, None),
    }
}

/// Read and parse the annotated tag `rev` resolves to
///
/// # Errors
///
/// `TypeMismatch` if `rev` is not a tag object, or any batch error.
pub fn read_tag(batch: &mut dyn CatFileBatch, rev: &str) -> Result<Tag> {
    let (object, reader) = batch.query_content(rev)?;
    if object.kind != ObjectType::Tag {
        reader.discard_rest()?;
        return Err(WalkError::TypeMismatch {
            expected: "tag",
            actual: object.kind.to_string(),
        });
    }
    let payload = reader.read_payload()?;
    Tag::parse(object.id, &payload)
}

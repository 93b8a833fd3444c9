// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! In-memory batch used by unit tests

use std::io::{self, Cursor, Write};
use std::sync::Arc;

use gitcat_batch::{
    BatchCommunicator, BatchReader, BatchVariant, CatFileBatch, CatFileObject, ObjectFormat,
    ObjectId, ObjectType, Request, Result,
};
use parking_lot::Mutex;

#[derive(Clone, Default)]
struct Recorder(Arc<Mutex<Vec<u8>>>);

impl Write for Recorder {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// A `--batch-command` peer that replays canned responses in order
pub(crate) struct ScriptedBatch {
    conversation: BatchCommunicator,
    sent: Recorder,
}

impl ScriptedBatch {
    pub fn new(responses: Vec<u8>) -> Self {
        let sent = Recorder::default();
        Self {
            conversation: BatchCommunicator::from_parts(
                Cursor::new(responses),
                sent.clone(),
                ObjectFormat::Sha1,
            ),
            sent,
        }
    }

    /// Everything written so far
    pub fn requests(&self) -> String {
        String::from_utf8_lossy(&self.sent.0.lock()).into_owned()
    }
}

/// A header plus payload as cat-file sends it
pub(crate) fn response(id: &ObjectId, kind: &str, payload: &[u8]) -> Vec<u8> {
    let mut out = format!("{id} {kind} {}\n", payload.len()).into_bytes();
    out.extend_from_slice(payload);
    out.push(b'\n');
    out
}

/// A header alone, as sent for `info`
pub(crate) fn info(id: &ObjectId, kind: &str, size: usize) -> Vec<u8> {
    format!("{id} {kind} {size}\n").into_bytes()
}

/// A raw tree payload
pub(crate) fn tree_payload(entries: &[(&str, &str, &ObjectId)]) -> Vec<u8> {
    let mut out = Vec::new();
    for (mode, name, id) in entries {
        out.extend_from_slice(format!("{mode} {name}\0").as_bytes());
        out.extend_from_slice(id.as_bytes());
    }
    out
}

/// A sha1 id made of one repeated byte
pub(crate) fn oid(byte: u8) -> ObjectId {
    ObjectId::from_hex(&format!("{byte:02x}").repeat(20)).expect("valid id")
}

impl CatFileBatch for ScriptedBatch {
    fn variant(&self) -> BatchVariant {
        BatchVariant::Command
    }

    fn object_format(&self) -> ObjectFormat {
        ObjectFormat::Sha1
    }

    fn query_info(&mut self, id: &str) -> Result<CatFileObject> {
        self.conversation.request(Request::Info(id))
    }

    fn query_content(&mut self, id: &str) -> Result<(CatFileObject, &mut BatchReader)> {
        let object = self.conversation.request(Request::Contents(id))?;
        Ok((object, self.conversation.reader()))
    }

    fn open(&mut self) -> Result<()> {
        Ok(())
    }

    fn close(&mut self) {
        self.conversation.close();
    }

    fn is_usable(&self) -> bool {
        self.conversation.is_usable()
    }
}

#[test]
fn test_scripted_batch_replays_in_order() {
    let blob = oid(1);
    let mut script = info(&blob, "blob", 3);
    script.extend(response(&blob, "blob", b"abc"));
    let mut batch = ScriptedBatch::new(script);

    let object = batch.query_info("HEAD:a").expect("info");
    assert_eq!(object.kind, ObjectType::Blob);
    let (_, reader) = batch.query_content("HEAD:a").expect("content");
    assert_eq!(reader.read_payload().expect("payload"), b"abc");
    assert_eq!(batch.requests(), "info HEAD:a\ncontents HEAD:a\n");
}

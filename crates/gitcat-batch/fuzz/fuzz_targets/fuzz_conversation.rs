// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Fuzz target for a whole conversation over an arbitrary response stream
//!
//! Requests keep going until the conversation reports itself unusable; a
//! soft error must never leave it poisoned.

#![no_main]

use libfuzzer_sys::fuzz_target;

use gitcat_batch::{BatchCommunicator, ObjectFormat, Request};

fuzz_target!(|data: &[u8]| {
    let mut comm = BatchCommunicator::from_parts(
        std::io::Cursor::new(data.to_vec()),
        std::io::sink(),
        ObjectFormat::Sha1,
    );
    for _ in 0..64 {
        match comm.request(Request::Contents("HEAD")) {
            Ok(_) => {
                let _ = comm.reader().read_payload();
            }
            Err(e) if e.is_not_found() => assert!(comm.is_usable()),
            Err(_) => break,
        }
        if !comm.is_usable() {
            break;
        }
    }
});

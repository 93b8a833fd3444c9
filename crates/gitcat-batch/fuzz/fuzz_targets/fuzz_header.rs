// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Fuzz target for response header decoding
//!
//! Decoding must never panic, and anything accepted must encode back to
//! the same line.

#![no_main]

use libfuzzer_sys::fuzz_target;

use gitcat_batch::ObjectFormat;
use gitcat_batch::codec::{encode_header, read_batch_line};

fuzz_target!(|data: &[u8]| {
    for format in [ObjectFormat::Sha1, ObjectFormat::Sha256] {
        let mut rd = data;
        if let Ok(object) = read_batch_line(&mut rd, format) {
            let line = encode_header(&object);
            let mut again = line.as_bytes();
            let reparsed = read_batch_line(&mut again, format).expect("encoded header parses");
            assert_eq!(reparsed, object);
        }
    }
});

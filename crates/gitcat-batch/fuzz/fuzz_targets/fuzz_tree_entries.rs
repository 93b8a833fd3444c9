// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Fuzz target for tree payload decoding
//!
//! The declared size is taken from the input so that truncated and
//! overlong payloads are both exercised.

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use gitcat_batch::ObjectFormat;
use gitcat_batch::codec::read_tree_entries;

#[derive(Debug, Arbitrary)]
struct Input {
    sha256: bool,
    declared: u16,
    payload: Vec<u8>,
}

fuzz_target!(|input: Input| {
    let format = if input.sha256 {
        ObjectFormat::Sha256
    } else {
        ObjectFormat::Sha1
    };
    let mut rd = input.payload.as_slice();
    let result = read_tree_entries(&mut rd, format, u64::from(input.declared));
    // anything short of a hard error leaves the stream at the next response
    if !matches!(&result, Err(e) if e.is_hard()) {
        let consumed = input.payload.len() - rd.len();
        assert_eq!(consumed, usize::from(input.declared) + 1);
    }
});

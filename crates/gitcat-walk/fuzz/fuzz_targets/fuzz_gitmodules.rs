// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Fuzz target for `.gitmodules` parsing

#![no_main]

use libfuzzer_sys::fuzz_target;

use gitcat_walk::{find_submodule, parse_gitmodules};

fuzz_target!(|data: &[u8]| {
    let content = String::from_utf8_lossy(data);
    let modules = parse_gitmodules(&content);
    for module in &modules {
        let found = find_submodule(&modules, &module.path).expect("parsed path is findable");
        assert_eq!(found.path.trim_matches('/'), module.path.trim_matches('/'));
    }
});

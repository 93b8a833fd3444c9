// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! `.gitmodules` resolution
//!
//! The file uses git's config syntax. Only `[submodule "<name>"]` sections
//! are read; keys are case-insensitive and values may be quoted.

use gitcat_batch::{CatFileBatch, ObjectType};
use serde::Serialize;
use tracing::debug;

use crate::error::{Result, WalkError};

/// One configured submodule
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Submodule {
    /// Section name
    pub name: String,
    /// Location of the gitlink inside the superproject
    pub path: String,
    /// Clone URL
    pub url: String,
    /// Branch to track, if configured
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
}

#[derive(Default)]
struct Section {
    name: String,
    path: Option<String>,
    url: Option<String>,
    branch: Option<String>,
}

impl Section {
    fn finish(self) -> Option<Submodule> {
        Some(Submodule {
            path: self.path?,
            url: self.url.unwrap_or_default(),
            branch: self.branch,
            name: self.name,
        })
    }
}

/// Parse the contents of a `.gitmodules` file
///
/// Sections without a `path` are skipped. Later values of a repeated key
/// win.
#[must_use]
pub fn parse_gitmodules(content: &str) -> Vec<Submodule> {
    let mut modules = Vec::new();
    let mut current: Option<Section> = None;

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }

        if line.starts_with('[') {
            if let Some(done) = current.take().and_then(Section::finish) {
                modules.push(done);
            }
            current = parse_section_header(line).map(|name| Section {
                name,
                ..Section::default()
            });
            continue;
        }

        let Some(section) = current.as_mut() else {
            continue;
        };
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let value = parse_value(value);
        match key.trim().to_ascii_lowercase().as_str() {
            "path" => section.path = Some(value),
            "url" => section.url = Some(value),
            "branch" => section.branch = Some(value),
            _ => {}
        }
    }

    if let Some(done) = current.and_then(Section::finish) {
        modules.push(done);
    }
    modules
}

/// `[submodule "name"]` gives `Some("name")`; anything else `None`
fn parse_section_header(line: &str) -> Option<String> {
    let inner = line.strip_prefix('[')?;
    let inner = inner[..inner.rfind(']')?].trim();
    let (section, rest) = inner.split_once(char::is_whitespace)?;
    if !section.eq_ignore_ascii_case("submodule") {
        return None;
    }
    let quoted = rest.trim().strip_prefix('"')?.strip_suffix('"')?;

    let mut name = String::with_capacity(quoted.len());
    let mut chars = quoted.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => name.extend(chars.next()),
            c => name.push(c),
        }
    }
    Some(name)
}

fn parse_value(raw: &str) -> String {
    let mut value = String::new();
    let mut in_quotes = false;
    let mut chars = raw.trim().chars();
    while let Some(c) = chars.next() {
        match c {
            '"' => in_quotes = !in_quotes,
            '\\' => match chars.next() {
                Some('n') => value.push('\n'),
                Some('t') => value.push('\t'),
                Some(other) => value.push(other),
                None => {}
            },
            '#' | ';' if !in_quotes => break,
            c => value.push(c),
        }
    }
    value.trim_end().to_string()
}

/// Read the submodules configured at `commit`
///
/// A commit without `.gitmodules` has no submodules.
///
/// # Errors
///
/// `TypeMismatch` if `.gitmodules` is not a blob, or a hard batch error.
pub fn submodules(batch: &mut dyn CatFileBatch, commit: &str) -> Result<Vec<Submodule>> {
    let rev = format!("{commit}:.gitmodules");
    let (object, reader) = match batch.query_content(&rev) {
        Ok(found) => found,
        Err(e) if e.is_not_found() => {
            debug!(commit, "no .gitmodules");
            return Ok(Vec::new());
        }
        Err(e) => return Err(e.into()),
    };
    if object.kind != ObjectType::Blob {
        reader.discard_rest()?;
        return Err(WalkError::TypeMismatch {
            expected: "blob",
            actual: object.kind.to_string(),
        });
    }
    let payload = reader.read_payload()?;
    Ok(parse_gitmodules(&String::from_utf8_lossy(&payload)))
}

/// The submodule whose gitlink lives at `path`
#[must_use]
pub fn find_submodule<'a>(modules: &'a [Submodule], path: &str) -> Option<&'a Submodule> {
    let path = path.trim_matches('/');
    modules.iter().find(|m| m.path.trim_matches('/') == path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ScriptedBatch, oid, response};
    use similar_asserts::assert_eq;

    const GITMODULES: &str = r#"
# vendored dependencies
[submodule "libfoo"]
	path = vendor/libfoo
	url = https://example.com/libfoo.git
	branch = stable
[core]
	path = ignored
[Submodule "with \"quotes\""]
	PATH = "third party/bar" ; trailing comment
	url = ../bar.git
[submodule "no-path"]
	url = https://example.com/orphan.git
"#;

    #[test]
    fn test_parse_gitmodules() {
        let modules = parse_gitmodules(GITMODULES);
        assert_eq!(
            modules,
            vec![
                Submodule {
                    name: "libfoo".to_string(),
                    path: "vendor/libfoo".to_string(),
                    url: "https://example.com/libfoo.git".to_string(),
                    branch: Some("stable".to_string()),
                },
                Submodule {
                    name: "with \"quotes\"".to_string(),
                    path: "third party/bar".to_string(),
                    url: "../bar.git".to_string(),
                    branch: None,
                },
            ]
        );
    }

    #[test]
    fn test_find_submodule() {
        let modules = parse_gitmodules(GITMODULES);
        assert_eq!(
            find_submodule(&modules, "/vendor/libfoo/").map(|m| m.name.as_str()),
            Some("libfoo")
        );
        assert!(find_submodule(&modules, "vendor").is_none());
    }

    #[test]
    fn test_empty_and_garbage_input() {
        assert!(parse_gitmodules("").is_empty());
        assert!(parse_gitmodules("path = x\n[submodule]\npath = y\n").is_empty());
    }

    #[test]
    fn test_missing_gitmodules_is_empty() {
        let mut batch = ScriptedBatch::new(b"HEAD:.gitmodules missing\n".to_vec());
        assert_eq!(submodules(&mut batch, "HEAD").expect("no submodules"), Vec::new());
    }

    #[test]
    fn test_submodules_from_blob() {
        let blob = oid(9);
        let script = response(&blob, "blob", GITMODULES.as_bytes());
        let mut batch = ScriptedBatch::new(script);
        let modules = submodules(&mut batch, "HEAD").expect("submodules");
        assert_eq!(modules.len(), 2);
        assert_eq!(batch.requests(), "contents HEAD:.gitmodules\n");
    }
}

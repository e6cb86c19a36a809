// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Path pattern matching for policy entries.
//!
//! Entries are either literal paths, which match themselves and everything
//! below them, or globs using `*`, `**` and `?`. A leading `~` expands to the
//! home directory and relative entries resolve against the working directory.

use std::path::{Component, Path, PathBuf};

pub fn is_glob(pattern: &str) -> bool {
    pattern.contains('*') || pattern.contains('?')
}

/// Resolve a pattern or path to an absolute, lexically normalized path
pub fn resolve(raw: &str, cwd: &Path) -> PathBuf {
    let expanded = expand_home(raw);
    let absolute = if expanded.is_absolute() {
        expanded
    } else {
        cwd.join(expanded)
    };
    normalize(&absolute)
}

fn expand_home(raw: &str) -> PathBuf {
    let home = dirs::home_dir();
    match (raw, home) {
        ("~", Some(home)) => home,
        (rest, Some(home)) if rest.starts_with("~/") => home.join(&rest[2..]),
        (other, _) => PathBuf::from(other),
    }
}

fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Translate a glob into an anchored regular expression
pub fn glob_to_regex(glob: &str) -> String {
    let mut regex = String::from("^");
    let mut chars = glob.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' if chars.peek() == Some(&'*') => {
                chars.next();
                if chars.peek() == Some(&'/') {
                    chars.next();
                    regex.push_str("(?:.*/)?");
                } else {
                    regex.push_str(".*");
                }
            }
            '*' => regex.push_str("[^/]*"),
            '?' => regex.push_str("[^/]"),
            other => regex.push_str(&regex::escape(&other.to_string())),
        }
    }
    regex.push('$');
    regex
}

/// True when `path` is covered by `pattern`
pub fn matches(pattern: &str, path: &Path, cwd: &Path) -> bool {
    let resolved = resolve(pattern, cwd);
    let target = normalize(&if path.is_absolute() {
        path.to_path_buf()
    } else {
        cwd.join(path)
    });

    if !is_glob(pattern) {
        return target.starts_with(&resolved);
    }

    let source = glob_to_regex(&resolved.to_string_lossy());
    match regex::Regex::new(&source) {
        Ok(re) => re.is_match(&target.to_string_lossy()),
        Err(e) => {
            tracing::warn!(pattern, error = %e, "ignoring unusable sandbox pattern");
            false
        }
    }
}

//! Path syntax for hierarchically addressed nodes.
//!
//! A fully qualified path is a sequence of `:`-prefixed segments
//! (`:Users:alice:mail`). The root is the empty path `""`. Segments are
//! restricted to ASCII letters, digits, and dashes; anything else is
//! rejected before it reaches a storage backend.

use std::sync::LazyLock;

use regex::Regex;

use crate::constants::PATH_DELIMITER;

static PATH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\A(?::[A-Za-z0-9-]+)*\z").expect("path pattern is valid"));

static SEGMENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\A[A-Za-z0-9-]+\z").expect("segment pattern is valid"));

/// Whether `path` is a well-formed fully qualified path.
///
/// The empty string (the root) is valid; `":a:b"` is valid; `"a"`, `":"`,
/// and `":a:"` are not.
pub fn is_valid(path: &str) -> bool {
    PATH_RE.is_match(path)
}

/// Whether `name` is a well-formed single path segment.
pub fn is_valid_segment(name: &str) -> bool {
    SEGMENT_RE.is_match(name)
}

/// The name part of a fully qualified path (the substring after the last
/// delimiter). The root path yields the empty name.
pub fn name_of(path: &str) -> &str {
    match path.rfind(PATH_DELIMITER) {
        Some(idx) => &path[idx + 1..],
        None => path,
    }
}

/// The parent part of a fully qualified path (the substring before the
/// last delimiter), or the empty root path if there is no delimiter.
pub fn parent_of(path: &str) -> &str {
    match path.rfind(PATH_DELIMITER) {
        Some(idx) => &path[..idx],
        None => "",
    }
}

/// Joins a parent path and a child name into a fully qualified path.
pub fn join(parent: &str, name: &str) -> String {
    format!("{parent}{PATH_DELIMITER}{name}")
}

//! Lexical request-path sanitization.
//!
//! Cleaning happens before any filesystem access; `join_base` only ever
//! pushes normal components, so the result is always prefixed by the base
//! directory no matter how many `..` segments the request contained.

use std::path::{Component, Path, PathBuf};

/// Collapse a raw request path into a clean relative path.
///
/// Empty and `.` segments are dropped, `..` pops the previous segment and
/// is discarded at the root. Purely lexical, no I/O.
pub fn clean_request_path(raw: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for part in raw.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            p => parts.push(p),
        }
    }
    parts.join("/")
}

/// Join a cleaned relative path onto the base directory.
///
/// Only normal components are appended, so a crafted segment cannot
/// replace the base the way a naive `Path::join` with an absolute path
/// would. An empty path resolves to the base directory itself.
pub fn join_base(base: &Path, cleaned: &str) -> PathBuf {
    let mut full = base.to_path_buf();
    for comp in Path::new(cleaned).components() {
        if let Component::Normal(seg) = comp {
            full.push(seg);
        }
    }
    full
}

//! Domain types for mirrored store nodes.
//!
//! Store paths are plain `String`s (`/app/db`), never `PathBuf`: they are
//! keys in a remote tree, not filesystem locations.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use crate::error::StoreError;

// ---------------------------------------------------------------------------
// Stat
// ---------------------------------------------------------------------------

/// Version metadata the store returns alongside a node.
///
/// Treated as an opaque token by the synchronizer; exposed to templates so a
/// config can embed e.g. the data version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Stat {
    pub czxid: i64,
    pub mzxid: i64,
    pub pzxid: i64,
    pub version: i32,
    pub cversion: i32,
    pub data_length: i32,
    pub num_children: i32,
}

// ---------------------------------------------------------------------------
// Node
// ---------------------------------------------------------------------------

/// One store entry as it was last fetched.
///
/// Records are replaced wholesale on refetch, never field-mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub path: String,
    pub stat: Stat,
    /// Child names (not full paths), in store order.
    pub children: Vec<String>,
    pub value: Vec<u8>,
}

impl Node {
    /// Node value decoded as UTF-8, replacing invalid sequences.
    pub fn value_str(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.value)
    }

    /// Absolute paths of every recorded child.
    pub fn child_paths(&self) -> impl Iterator<Item = String> + '_ {
        self.children.iter().map(|c| join_path(&self.path, c))
    }
}

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

/// Join a child name onto a parent store path.
pub fn join_path(parent: &str, child: &str) -> String {
    if parent.ends_with('/') {
        format!("{parent}{child}")
    } else {
        format!("{parent}/{child}")
    }
}

/// Parent of a store path; `None` for the root.
pub fn parent_path(path: &str) -> Option<&str> {
    if path == "/" {
        return None;
    }
    match path.rfind('/') {
        Some(0) => Some("/"),
        Some(idx) => Some(&path[..idx]),
        None => None,
    }
}

/// Last segment of a store path.
pub fn node_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// `true` if `path` lies strictly below `ancestor`.
pub fn is_descendant(path: &str, ancestor: &str) -> bool {
    if ancestor == "/" {
        return path != "/" && path.starts_with('/');
    }
    path.len() > ancestor.len()
        && path.starts_with(ancestor)
        && path.as_bytes()[ancestor.len()] == b'/'
}

/// Reject relative paths, trailing slashes and empty segments.
pub fn validate_path(path: &str) -> Result<(), StoreError> {
    let bad = || StoreError::BadPath {
        path: path.to_string(),
    };
    if path == "/" {
        return Ok(());
    }
    if !path.starts_with('/') || path.ends_with('/') || path.contains("//") {
        return Err(bad());
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_handles_root_and_nested_parents() {
        assert_eq!(join_path("/", "app"), "/app");
        assert_eq!(join_path("/app", "db"), "/app/db");
    }

    #[test]
    fn parent_of_top_level_node_is_root() {
        assert_eq!(parent_path("/app"), Some("/"));
        assert_eq!(parent_path("/app/db/host"), Some("/app/db"));
        assert_eq!(parent_path("/"), None);
    }

    #[test]
    fn descendant_requires_segment_boundary() {
        assert!(is_descendant("/app/db", "/app"));
        assert!(!is_descendant("/application", "/app"));
        assert!(!is_descendant("/app", "/app"));
        assert!(is_descendant("/app", "/"));
    }

    #[test]
    fn validate_rejects_relative_and_trailing_slash() {
        assert!(validate_path("/app").is_ok());
        assert!(validate_path("/").is_ok());
        assert!(validate_path("app").is_err());
        assert!(validate_path("/app/").is_err());
        assert!(validate_path("/app//db").is_err());
    }

    #[test]
    fn value_str_is_lossy() {
        let node = Node {
            path: "/bin".to_string(),
            stat: Stat::default(),
            children: vec![],
            value: vec![b'o', b'k', 0xff],
        };
        assert_eq!(node.value_str(), "ok\u{fffd}");
        assert_eq!(node_name("/a/bin"), "bin");
    }
}

//! In-process mirror of a store subtree.

use std::collections::HashMap;

use serde::Serialize;

use crate::types::Node;
use crate::value::{Record, Value};

/// Mapping from absolute store path to the last fetched [`Node`].
///
/// The snapshot is owned by one orchestrator and mutated only by the tree
/// synchronizer and the stale pruner.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    nodes: HashMap<String, Node>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, path: &str) -> Option<&Node> {
        self.nodes.get(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.nodes.contains_key(path)
    }

    /// Insert or replace the record for `node.path`; returns the previous one.
    pub fn insert(&mut self, node: Node) -> Option<Node> {
        self.nodes.insert(node.path.clone(), node)
    }

    pub fn remove(&mut self, path: &str) -> Option<Node> {
        self.nodes.remove(path)
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Node)> {
        self.nodes.iter()
    }

    /// All paths, sorted.
    pub fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.nodes.keys().cloned().collect();
        paths.sort();
        paths
    }

    /// Structured view used as the template data root.
    ///
    /// `path → { path, stat { … }, children [ … ], value }`.
    pub fn to_value(&self) -> Value {
        Value::Map(
            self.nodes
                .iter()
                .map(|(path, node)| (path.clone(), node_value(node)))
                .collect(),
        )
    }
}

fn node_value(node: &Node) -> Value {
    let stat = &node.stat;
    let stat = Record::new("Stat")
        .field("czxid", stat.czxid)
        .field("mzxid", stat.mzxid)
        .field("pzxid", stat.pzxid)
        .field("version", i64::from(stat.version))
        .field("cversion", i64::from(stat.cversion))
        .field("data_length", i64::from(stat.data_length))
        .field("num_children", i64::from(stat.num_children));
    Value::Record(
        Record::new("Node")
            .field("path", node.path.as_str())
            .field("stat", Value::Record(stat))
            .field(
                "children",
                Value::Seq(node.children.iter().map(|c| Value::from(c.as_str())).collect()),
            )
            .field("value", node.value_str().into_owned()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Stat;

    fn node(path: &str, value: &str, children: &[&str]) -> Node {
        Node {
            path: path.to_string(),
            stat: Stat {
                version: 3,
                ..Stat::default()
            },
            children: children.iter().map(|c| c.to_string()).collect(),
            value: value.as_bytes().to_vec(),
        }
    }

    #[test]
    fn insert_replaces_whole_record() {
        let mut snapshot = Snapshot::new();
        assert!(snapshot.insert(node("/app", "1", &["db"])).is_none());
        let previous = snapshot.insert(node("/app", "2", &[])).expect("previous record");
        assert_eq!(previous.children, vec!["db".to_string()]);
        assert_eq!(snapshot.get("/app").unwrap().value, b"2");
        assert_eq!(snapshot.len(), 1);
    }

    #[test]
    fn to_value_exposes_node_fields() {
        let mut snapshot = Snapshot::new();
        snapshot.insert(node("/app", "v1", &["db"]));
        let root = snapshot.to_value();

        assert_eq!(root.resolve(&["/app", "value"]), Some(&Value::from("v1")));
        assert_eq!(root.resolve(&["/app", "children", "0"]), Some(&Value::from("db")));
        assert_eq!(root.resolve(&["/app", "stat", "version"]), Some(&Value::from(3i64)));
        assert_eq!(root.resolve(&["/missing", "value"]), None);
    }

    #[test]
    fn paths_are_sorted() {
        let mut snapshot = Snapshot::new();
        snapshot.insert(node("/b", "", &[]));
        snapshot.insert(node("/a", "", &[]));
        assert_eq!(snapshot.paths(), vec!["/a".to_string(), "/b".to_string()]);
    }
}

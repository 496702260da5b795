//! Subtree mirroring: fetch nodes depth-first into a [`Snapshot`], arming a
//! children watch and a data watch on every visited node.

use zkagent_core::{Node, Snapshot, Store, Watch};

use crate::error::SyncError;

/// Remove `path` and every descendant reachable through recorded children.
///
/// Returns the number of entries removed; an unknown path removes nothing.
pub fn prune(snapshot: &mut Snapshot, path: &str) -> usize {
    let mut removed = 0;
    let mut stack = vec![path.to_string()];
    while let Some(current) = stack.pop() {
        if let Some(node) = snapshot.remove(&current) {
            removed += 1;
            stack.extend(node.child_paths());
        }
    }
    if removed > 0 {
        tracing::debug!("pruned {removed} entries under {path}");
    }
    removed
}

/// One mirroring pass against a store.
///
/// Watches accumulate across calls to [`TreeSync::sync`] and are kept even
/// when a call fails part-way, so whatever was armed stays observable.
pub struct TreeSync<'a, S: Store + ?Sized> {
    store: &'a S,
    watches: Vec<Watch>,
    visited: Vec<String>,
}

impl<'a, S: Store + ?Sized> TreeSync<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self {
            store,
            watches: Vec::new(),
            visited: Vec::new(),
        }
    }

    /// Mirror every subtree rooted at `paths` into `snapshot`.
    ///
    /// Each root is pruned before it is refetched. A node's record is written
    /// before its children are fetched. The first failed read aborts the
    /// call; records written earlier stay in the snapshot.
    pub async fn sync(&mut self, snapshot: &mut Snapshot, paths: &[String]) -> Result<(), SyncError> {
        let mut stack: Vec<String> = paths.iter().rev().cloned().collect();
        while let Some(path) = stack.pop() {
            prune(snapshot, &path);
            let node = self.fetch(&path).await?;
            let children: Vec<String> = node.child_paths().collect();
            snapshot.insert(node);
            self.visited.push(path);
            stack.extend(children.into_iter().rev());
        }
        Ok(())
    }

    async fn fetch(&mut self, path: &str) -> Result<Node, SyncError> {
        let (children, _, children_watch) = self.store.children_w(path).await?;
        self.watches.push(children_watch);
        let (value, stat, data_watch) = self.store.get_w(path).await?;
        self.watches.push(data_watch);
        Ok(Node {
            path: path.to_string(),
            stat,
            children,
            value,
        })
    }

    /// Paths written so far, in visit order.
    pub fn visited(&self) -> &[String] {
        &self.visited
    }

    pub fn into_watches(self) -> Vec<Watch> {
        self.watches
    }
}

/// Mirror `paths` in one pass and hand back the armed watches.
pub async fn sync<S: Store + ?Sized>(
    store: &S,
    snapshot: &mut Snapshot,
    paths: &[String],
) -> Result<Vec<Watch>, SyncError> {
    let mut pass = TreeSync::new(store);
    pass.sync(snapshot, paths).await?;
    Ok(pass.into_watches())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! In-memory [`Store`] with ZooKeeper watch semantics.
//!
//! | Mutation        | Watches fired                                              |
//! |-----------------|------------------------------------------------------------|
//! | `set(p)`        | data watches on `p` → `DataChanged`                        |
//! | `create(p)`     | children watches on parent → `ChildrenChanged`             |
//! | `delete(p)`     | all watches on `p` → `Deleted`; parent → `ChildrenChanged` |
//!
//! Every watch fires at most once and is discarded afterwards.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio::sync::{broadcast, oneshot};

use crate::error::StoreError;
use crate::store::{EventKind, SessionState, Store, Watch, WatchEvent, WatchKind};
use crate::types::{node_name, parent_path, validate_path, Stat};

#[derive(Debug, Clone)]
struct MemNode {
    data: Vec<u8>,
    children: Vec<String>,
    stat: Stat,
}

#[derive(Default)]
struct Inner {
    zxid: i64,
    nodes: BTreeMap<String, MemNode>,
    data_watches: HashMap<String, Vec<oneshot::Sender<WatchEvent>>>,
    child_watches: HashMap<String, Vec<oneshot::Sender<WatchEvent>>>,
    failures: HashMap<String, StoreError>,
}

impl Inner {
    fn next_zxid(&mut self) -> i64 {
        self.zxid += 1;
        self.zxid
    }

    fn fire(&mut self, kind: WatchKind, path: &str, event: EventKind) {
        let watches = match kind {
            WatchKind::Data => &mut self.data_watches,
            WatchKind::Children => &mut self.child_watches,
        };
        for tx in watches.remove(path).unwrap_or_default() {
            let _ = tx.send(WatchEvent::new(event, path));
        }
    }

    /// Register `tx` on `path`, dropping senders whose watch was discarded.
    fn arm(&mut self, kind: WatchKind, path: &str, tx: oneshot::Sender<WatchEvent>) {
        let watches = match kind {
            WatchKind::Data => &mut self.data_watches,
            WatchKind::Children => &mut self.child_watches,
        };
        let list = watches.entry(path.to_string()).or_default();
        list.retain(|tx| !tx.is_closed());
        list.push(tx);
    }

    fn check(&self, path: &str) -> Result<&MemNode, StoreError> {
        validate_path(path)?;
        if let Some(err) = self.failures.get(path) {
            return Err(err.clone());
        }
        self.nodes.get(path).ok_or_else(|| StoreError::NoNode {
            path: path.to_string(),
        })
    }
}

/// Process-local coordination store.
pub struct MemoryStore {
    inner: Mutex<Inner>,
    session: Mutex<Option<broadcast::Sender<SessionState>>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Empty store containing only `/`.
    pub fn new() -> Self {
        let mut inner = Inner::default();
        inner.nodes.insert(
            "/".to_string(),
            MemNode {
                data: Vec::new(),
                children: Vec::new(),
                stat: Stat::default(),
            },
        );
        let (tx, _) = broadcast::channel(16);
        Self {
            inner: Mutex::new(inner),
            session: Mutex::new(Some(tx)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Create `path` under an existing parent.
    pub fn create(&self, path: &str, data: impl Into<Vec<u8>>) -> Result<(), StoreError> {
        validate_path(path)?;
        let parent = parent_path(path).ok_or_else(|| StoreError::NodeExists {
            path: path.to_string(),
        })?;
        let mut inner = self.lock();
        if inner.nodes.contains_key(path) {
            return Err(StoreError::NodeExists {
                path: path.to_string(),
            });
        }
        if !inner.nodes.contains_key(parent) {
            return Err(StoreError::NoNode {
                path: parent.to_string(),
            });
        }
        let zxid = inner.next_zxid();
        let data = data.into();
        let stat = Stat {
            czxid: zxid,
            mzxid: zxid,
            pzxid: zxid,
            data_length: data.len() as i32,
            ..Stat::default()
        };
        inner.nodes.insert(
            path.to_string(),
            MemNode {
                data,
                children: Vec::new(),
                stat,
            },
        );
        if let Some(parent_node) = inner.nodes.get_mut(parent) {
            parent_node.children.push(node_name(path).to_string());
            parent_node.stat.cversion += 1;
            parent_node.stat.pzxid = zxid;
            parent_node.stat.num_children = parent_node.children.len() as i32;
        }
        inner.fire(WatchKind::Children, parent, EventKind::ChildrenChanged);
        Ok(())
    }

    /// Create `path` and any missing ancestors (ancestors get empty data).
    pub fn create_all(&self, path: &str, data: impl Into<Vec<u8>>) -> Result<(), StoreError> {
        validate_path(path)?;
        let mut ancestors = Vec::new();
        let mut cursor = parent_path(path);
        while let Some(p) = cursor {
            if p == "/" || self.exists(p) {
                break;
            }
            ancestors.push(p.to_string());
            cursor = parent_path(p);
        }
        for ancestor in ancestors.iter().rev() {
            self.create(ancestor, Vec::new())?;
        }
        self.create(path, data)
    }

    /// Replace the data of `path`.
    pub fn set(&self, path: &str, data: impl Into<Vec<u8>>) -> Result<(), StoreError> {
        let mut inner = self.lock();
        inner.check(path)?;
        let zxid = inner.next_zxid();
        let data = data.into();
        if let Some(node) = inner.nodes.get_mut(path) {
            node.stat.version += 1;
            node.stat.mzxid = zxid;
            node.stat.data_length = data.len() as i32;
            node.data = data;
        }
        inner.fire(WatchKind::Data, path, EventKind::DataChanged);
        Ok(())
    }

    /// Delete a leaf node.
    pub fn delete(&self, path: &str) -> Result<(), StoreError> {
        let mut inner = self.lock();
        let node = inner.check(path)?;
        if !node.children.is_empty() {
            return Err(StoreError::NotEmpty {
                path: path.to_string(),
            });
        }
        let Some(parent) = parent_path(path) else {
            return Err(StoreError::BadPath {
                path: path.to_string(),
            });
        };
        let zxid = inner.next_zxid();
        inner.nodes.remove(path);
        let name = node_name(path);
        if let Some(parent_node) = inner.nodes.get_mut(parent) {
            parent_node.children.retain(|c| c != name);
            parent_node.stat.cversion += 1;
            parent_node.stat.pzxid = zxid;
            parent_node.stat.num_children = parent_node.children.len() as i32;
        }
        inner.fire(WatchKind::Data, path, EventKind::Deleted);
        inner.fire(WatchKind::Children, path, EventKind::Deleted);
        inner.fire(WatchKind::Children, parent, EventKind::ChildrenChanged);
        Ok(())
    }

    pub fn exists(&self, path: &str) -> bool {
        self.lock().nodes.contains_key(path)
    }

    /// Make every read of `path` fail with `err` until [`Self::clear_failure`].
    pub fn fail_path(&self, path: &str, err: StoreError) {
        self.lock().failures.insert(path.to_string(), err);
    }

    pub fn clear_failure(&self, path: &str) {
        self.lock().failures.remove(path);
    }

    /// Number of armed, unfired watches on `path`.
    pub fn armed_watches(&self, path: &str, kind: WatchKind) -> usize {
        let inner = self.lock();
        let watches = match kind {
            WatchKind::Data => &inner.data_watches,
            WatchKind::Children => &inner.child_watches,
        };
        watches
            .get(path)
            .map(|list| list.iter().filter(|tx| !tx.is_closed()).count())
            .unwrap_or(0)
    }

    /// Publish a session-state change to every subscriber.
    pub fn publish(&self, state: SessionState) {
        let session = self.session.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(tx) = session.as_ref() {
            let _ = tx.send(state);
        }
    }

    /// Simulate session expiry: every armed watch becomes inert.
    ///
    /// The store itself stays usable, as if the client had reconnected with a
    /// fresh session.
    pub fn expire(&self) {
        {
            let mut inner = self.lock();
            let dropped = inner.data_watches.len() + inner.child_watches.len();
            inner.data_watches.clear();
            inner.child_watches.clear();
            tracing::debug!(dropped, "memory store session expired");
        }
        self.publish(SessionState::Expired);
    }

    /// Close the event source; all session receivers observe `Closed`.
    pub fn close(&self) {
        {
            let mut inner = self.lock();
            inner.data_watches.clear();
            inner.child_watches.clear();
        }
        self.session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn children_w(&self, path: &str) -> Result<(Vec<String>, Stat, Watch), StoreError> {
        let mut inner = self.lock();
        let node = inner.check(path)?;
        let (children, stat) = (node.children.clone(), node.stat);
        let (tx, watch) = Watch::channel(path, WatchKind::Children);
        inner.arm(WatchKind::Children, path, tx);
        Ok((children, stat, watch))
    }

    async fn get_w(&self, path: &str) -> Result<(Vec<u8>, Stat, Watch), StoreError> {
        let mut inner = self.lock();
        let node = inner.check(path)?;
        let (data, stat) = (node.data.clone(), node.stat);
        let (tx, watch) = Watch::channel(path, WatchKind::Data);
        inner.arm(WatchKind::Data, path, tx);
        Ok((data, stat, watch))
    }

    fn session_events(&self) -> broadcast::Receiver<SessionState> {
        let session = self.session.lock().unwrap_or_else(PoisonError::into_inner);
        match session.as_ref() {
            Some(tx) => tx.subscribe(),
            None => {
                let (tx, rx) = broadcast::channel(1);
                drop(tx);
                rx
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

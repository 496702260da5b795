//! Coordination store interface.
//!
//! The synchronizer only needs three things from a store client: fetch a
//! node's children while arming a children watch, fetch its data while arming
//! a data watch, and a stream of session-state changes whose closure signals
//! shutdown.

use std::fmt;

use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, oneshot};

use crate::error::StoreError;
use crate::types::Stat;

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Category a watch observes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WatchKind {
    Data,
    Children,
}

/// What happened to a watched node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    DataChanged,
    ChildrenChanged,
    Created,
    Deleted,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKind::DataChanged => write!(f, "NodeDataChanged"),
            EventKind::ChildrenChanged => write!(f, "NodeChildrenChanged"),
            EventKind::Created => write!(f, "NodeCreated"),
            EventKind::Deleted => write!(f, "NodeDeleted"),
        }
    }
}

/// A fired watch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchEvent {
    pub kind: EventKind,
    pub path: String,
}

impl WatchEvent {
    pub fn new(kind: EventKind, path: impl Into<String>) -> Self {
        Self {
            kind,
            path: path.into(),
        }
    }
}

/// Session state reported by the store client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Connected,
    Disconnected,
    /// The session is gone together with all of its watches.
    Expired,
}

/// Every notification the agent republishes to its embedder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StoreEvent {
    Watch(WatchEvent),
    Session { state: SessionState },
}

impl fmt::Display for StoreEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreEvent::Watch(event) => write!(f, "{}: {}", event.kind, event.path),
            StoreEvent::Session { state } => write!(f, "Session: {state:?}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Watch
// ---------------------------------------------------------------------------

/// One-shot subscription on one path and one [`WatchKind`].
///
/// Resolves at most once. `fired` yields `None` when the store dropped the
/// watch without firing it (session expired, client closed).
pub struct Watch {
    path: String,
    kind: WatchKind,
    fired: BoxFuture<'static, Option<WatchEvent>>,
}

impl Watch {
    /// Wrap an arbitrary future as a watch.
    pub fn from_future(
        path: impl Into<String>,
        kind: WatchKind,
        fired: impl std::future::Future<Output = Option<WatchEvent>> + Send + 'static,
    ) -> Self {
        Self {
            path: path.into(),
            kind,
            fired: fired.boxed(),
        }
    }

    /// Channel-backed watch; the store keeps the sender and fires it once.
    pub fn channel(path: impl Into<String>, kind: WatchKind) -> (oneshot::Sender<WatchEvent>, Self) {
        let (tx, rx) = oneshot::channel();
        let watch = Self::from_future(path, kind, async move { rx.await.ok() });
        (tx, watch)
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn kind(&self) -> WatchKind {
        self.kind
    }

    /// Wait for the single firing.
    pub async fn fired(self) -> Option<WatchEvent> {
        self.fired.await
    }
}

impl fmt::Debug for Watch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Watch")
            .field("path", &self.path)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// Store client seam. Implemented by [`crate::memory::MemoryStore`] and, with
/// the `zookeeper` feature, by `crate::zookeeper::ZkStore`.
#[async_trait]
pub trait Store: Send + Sync {
    /// Children of `path` plus a children watch on it.
    async fn children_w(&self, path: &str) -> Result<(Vec<String>, Stat, Watch), StoreError>;

    /// Data of `path` plus a data watch on it.
    async fn get_w(&self, path: &str) -> Result<(Vec<u8>, Stat, Watch), StoreError>;

    /// Session-state stream. Every receiver reports `Closed` once the
    /// connection's event source is gone.
    fn session_events(&self) -> broadcast::Receiver<SessionState>;
}

//! ZooKeeper-backed [`Store`] (feature `zookeeper`).

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::broadcast;
use zookeeper_client as zk;

use crate::error::StoreError;
use crate::store::{EventKind, SessionState, Store, Watch, WatchEvent, WatchKind};
use crate::types::Stat;

/// Live ZooKeeper session.
pub struct ZkStore {
    client: zk::Client,
    session: broadcast::Receiver<SessionState>,
}

impl ZkStore {
    /// Connect to `servers` (`host1:2181,host2:2181`).
    pub async fn connect(servers: &str, session_timeout: Duration) -> Result<Self, StoreError> {
        let client = zk::Client::connector()
            .session_timeout(session_timeout)
            .connect(servers)
            .await
            .map_err(|err| StoreError::Connect {
                servers: servers.to_string(),
                reason: err.to_string(),
            })?;

        let (tx, session) = broadcast::channel(16);
        let mut states = client.state_watcher();
        tokio::spawn(async move {
            loop {
                let state = states.changed().await;
                tracing::debug!(state = ?state, "zookeeper session state changed");
                let mapped = match state {
                    zk::SessionState::SyncConnected | zk::SessionState::ConnectedReadOnly => {
                        Some(SessionState::Connected)
                    }
                    zk::SessionState::Disconnected => Some(SessionState::Disconnected),
                    zk::SessionState::Expired => Some(SessionState::Expired),
                    _ => None,
                };
                if let Some(mapped) = mapped {
                    let _ = tx.send(mapped);
                }
                if matches!(
                    state,
                    zk::SessionState::Expired
                        | zk::SessionState::Closed
                        | zk::SessionState::AuthFailed
                ) {
                    // Dropping `tx` closes every session receiver.
                    break;
                }
            }
        });

        Ok(Self { client, session })
    }
}

fn map_err(path: &str, err: zk::Error) -> StoreError {
    let path = path.to_string();
    match err {
        zk::Error::NoNode => StoreError::NoNode { path },
        zk::Error::NodeExists => StoreError::NodeExists { path },
        zk::Error::NotEmpty => StoreError::NotEmpty { path },
        zk::Error::NoAuth => StoreError::NoAuth { path },
        zk::Error::ConnectionLoss => StoreError::ConnectionLoss,
        zk::Error::SessionExpired => StoreError::SessionExpired,
        zk::Error::ClientClosed => StoreError::Closed,
        other => StoreError::Other(other.to_string()),
    }
}

fn map_stat(stat: &zk::Stat) -> Stat {
    Stat {
        czxid: stat.czxid,
        mzxid: stat.mzxid,
        pzxid: stat.pzxid,
        version: stat.version,
        cversion: stat.cversion,
        data_length: stat.data_length,
        num_children: stat.num_children,
    }
}

fn map_watcher(path: &str, kind: WatchKind, watcher: zk::OneshotWatcher) -> Watch {
    Watch::from_future(path, kind, async move {
        let event = watcher.changed().await;
        let kind = match event.event_type {
            zk::EventType::NodeDataChanged => EventKind::DataChanged,
            zk::EventType::NodeChildrenChanged => EventKind::ChildrenChanged,
            zk::EventType::NodeCreated => EventKind::Created,
            zk::EventType::NodeDeleted => EventKind::Deleted,
            // Session events terminate the watch without a node change.
            _ => return None,
        };
        Some(WatchEvent::new(kind, event.path))
    })
}

#[async_trait]
impl Store for ZkStore {
    async fn children_w(&self, path: &str) -> Result<(Vec<String>, Stat, Watch), StoreError> {
        let (children, stat, watcher) = self
            .client
            .get_and_watch_children(path)
            .await
            .map_err(|err| map_err(path, err))?;
        Ok((
            children,
            map_stat(&stat),
            map_watcher(path, WatchKind::Children, watcher),
        ))
    }

    async fn get_w(&self, path: &str) -> Result<(Vec<u8>, Stat, Watch), StoreError> {
        let (data, stat, watcher) = self
            .client
            .get_and_watch_data(path)
            .await
            .map_err(|err| map_err(path, err))?;
        Ok((
            data,
            map_stat(&stat),
            map_watcher(path, WatchKind::Data, watcher),
        ))
    }

    fn session_events(&self) -> broadcast::Receiver<SessionState> {
        self.session.resubscribe()
    }
}

//! Fans armed watches into one ordered stream, batches firings, drives the
//! orchestrator and republishes every notification outward.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::mpsc::{self, error::TrySendError};

use zkagent_core::{SessionState, Store, StoreEvent, Watch, WatchEvent, WatchKind};

use crate::orchestrator::{Orchestrator, ReloadPlan, ReloadReport};

/// Bound on undelivered outward events.
pub const OUTWARD_CAPACITY: usize = 256;

/// First delay before a failed resync is retried; doubles per attempt.
const RETRY_BASE: Duration = Duration::from_millis(100);
const RETRY_MAX: Duration = Duration::from_secs(10);

fn retry_delay(attempt: u32) -> Duration {
    let factor = 1u32 << attempt.saturating_sub(1).min(16);
    RETRY_BASE.saturating_mul(factor).min(RETRY_MAX)
}

/// One republished notification.
#[derive(Debug, Clone, Serialize)]
pub struct AgentEvent {
    pub event: StoreEvent,
    /// Reload triggered by the batch this event belonged to.
    pub report: Option<Arc<ReloadReport>>,
    pub at: DateTime<Utc>,
    /// Events dropped on a full stream since the previous delivered one.
    pub dropped: u64,
}

impl AgentEvent {
    fn new(event: StoreEvent, report: Option<Arc<ReloadReport>>, dropped: u64) -> Self {
        Self {
            event,
            report,
            at: Utc::now(),
            dropped,
        }
    }
}

impl fmt::Display for AgentEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.event.fmt(f)
    }
}

#[derive(Debug)]
struct Fired {
    path: String,
    kind: WatchKind,
    id: u64,
    event: Option<WatchEvent>,
}

/// Armed `(path, kind)` watches, one live id per key.
#[derive(Debug, Default)]
pub(crate) struct WatchSet {
    armed: HashMap<(String, WatchKind), u64>,
    next_id: u64,
}

impl WatchSet {
    /// Returns `None` when the key is already armed.
    fn register(&mut self, path: &str, kind: WatchKind) -> Option<u64> {
        let key = (path.to_string(), kind);
        if self.armed.contains_key(&key) {
            return None;
        }
        self.next_id += 1;
        self.armed.insert(key, self.next_id);
        Some(self.next_id)
    }

    /// Disarm the key if `fired` is its live watch.
    fn settle(&mut self, fired: &Fired) -> bool {
        let key = (fired.path.clone(), fired.kind);
        if self.armed.get(&key) == Some(&fired.id) {
            self.armed.remove(&key);
            true
        } else {
            false
        }
    }

    fn clear(&mut self) {
        self.armed.clear();
    }

    fn len(&self) -> usize {
        self.armed.len()
    }
}

pub(crate) struct Router<S: Store + ?Sized> {
    orchestrator: Orchestrator<S>,
    watches: WatchSet,
    fired_tx: mpsc::UnboundedSender<Fired>,
    fired_rx: mpsc::UnboundedReceiver<Fired>,
    retry_tx: mpsc::UnboundedSender<String>,
    retry_rx: mpsc::UnboundedReceiver<String>,
    /// Paths awaiting a resync retry, with the attempts made so far.
    retries: HashMap<String, u32>,
    outward: mpsc::Sender<AgentEvent>,
    dropped: u64,
    debounce: Duration,
}

impl<S: Store + ?Sized + 'static> Router<S> {
    pub(crate) fn new(
        orchestrator: Orchestrator<S>,
        outward: mpsc::Sender<AgentEvent>,
        debounce: Duration,
    ) -> Self {
        let (fired_tx, fired_rx) = mpsc::unbounded_channel();
        let (retry_tx, retry_rx) = mpsc::unbounded_channel();
        Self {
            orchestrator,
            watches: WatchSet::default(),
            fired_tx,
            fired_rx,
            retry_tx,
            retry_rx,
            retries: HashMap::new(),
            outward,
            dropped: 0,
            debounce,
        }
    }

    /// Route until the session event source closes.
    pub(crate) async fn run(
        mut self,
        initial: Vec<Watch>,
        mut session: broadcast::Receiver<SessionState>,
    ) {
        self.arm(initial);
        loop {
            tokio::select! {
                biased;
                state = session.recv() => match state {
                    Ok(SessionState::Expired) => self.on_expired().await,
                    Ok(state) => {
                        tracing::info!(?state, "session state changed");
                        self.publish(StoreEvent::Session { state }, None);
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "session events lagged");
                    }
                    Err(RecvError::Closed) => break,
                },
                Some(first) = self.fired_rx.recv() => {
                    let batch = self.collect_batch(first).await;
                    self.on_batch(batch).await;
                }
                Some(path) = self.retry_rx.recv() => self.on_retry(path).await,
            }
        }
        tracing::info!("session closed, event stream ends");
    }

    fn arm(&mut self, watches: Vec<Watch>) {
        for watch in watches {
            let (path, kind) = (watch.path().to_string(), watch.kind());
            let Some(id) = self.watches.register(&path, kind) else {
                continue;
            };
            let tx = self.fired_tx.clone();
            tokio::spawn(async move {
                let event = watch.fired().await;
                let _ = tx.send(Fired {
                    path,
                    kind,
                    id,
                    event,
                });
            });
        }
        tracing::debug!(armed = self.watches.len(), "watches armed");
    }

    async fn collect_batch(&mut self, first: Fired) -> Vec<Fired> {
        let mut batch = vec![first];
        let window = tokio::time::sleep(self.debounce);
        tokio::pin!(window);
        loop {
            tokio::select! {
                _ = &mut window => break,
                fired = self.fired_rx.recv() => match fired {
                    Some(fired) => batch.push(fired),
                    None => break,
                },
            }
        }
        batch
    }

    async fn on_batch(&mut self, batch: Vec<Fired>) {
        let mut events = Vec::new();
        for fired in batch {
            if !self.watches.settle(&fired) {
                continue;
            }
            match fired.event {
                Some(event) => {
                    tracing::info!(kind = %event.kind, path = %event.path, "watch fired");
                    events.push(event);
                }
                None => {
                    tracing::debug!(path = %fired.path, kind = ?fired.kind, "watch dropped without firing");
                }
            }
        }
        if events.is_empty() {
            return;
        }

        let plan = ReloadPlan::from_events(&events);
        let (report, armed) = self.orchestrator.reload(&plan).await;
        self.arm(armed);
        self.track_retries(plan.resync.iter().chain(&plan.prune), &report);
        let report = Arc::new(report);
        for event in events {
            self.publish(StoreEvent::Watch(event), Some(Arc::clone(&report)));
        }
    }

    async fn on_retry(&mut self, path: String) {
        let Some(&attempt) = self.retries.get(&path) else {
            return;
        };
        tracing::info!(path = %path, attempt, "retrying resync");
        let (report, armed) = self.orchestrator.retry(&path).await;
        self.arm(armed);
        self.track_retries([&path], &report);
    }

    /// Forget retries for `requested` paths that settled, schedule the rest.
    fn track_retries<'p>(
        &mut self,
        requested: impl IntoIterator<Item = &'p String>,
        report: &ReloadReport,
    ) {
        for path in requested {
            if !report.retrying.contains(path) {
                self.retries.remove(path);
            }
        }
        for path in &report.retrying {
            let attempt = self.retries.entry(path.clone()).or_insert(0);
            *attempt += 1;
            let delay = retry_delay(*attempt);
            tracing::debug!(path = %path, attempt = *attempt, ?delay, "resync retry scheduled");
            let tx = self.retry_tx.clone();
            let path = path.clone();
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                let _ = tx.send(path);
            });
        }
    }

    async fn on_expired(&mut self) {
        tracing::warn!("session expired, rebuilding snapshot");
        self.watches.clear();
        self.retries.clear();
        let (report, armed) = self.orchestrator.rebuild().await;
        self.arm(armed);
        self.track_retries(std::iter::empty(), &report);
        self.publish(
            StoreEvent::Session {
                state: SessionState::Expired,
            },
            Some(Arc::new(report)),
        );
    }

    fn publish(&mut self, event: StoreEvent, report: Option<Arc<ReloadReport>>) {
        match self.outward.try_send(AgentEvent::new(event, report, self.dropped)) {
            Ok(()) => self.dropped = 0,
            Err(TrySendError::Full(dropped)) => {
                self.dropped += 1;
                tracing::warn!(event = %dropped, total = self.dropped, "outward stream full, dropping event");
            }
            Err(TrySendError::Closed(_)) => {
                tracing::trace!("outward stream has no receiver");
            }
        }
    }
}

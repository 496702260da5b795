//! Reload orchestration: resync or prune the touched subtrees, re-render every
//! job, then run the configured command.

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::RwLock;

use zkagent_core::types::{is_descendant, parent_path};
use zkagent_core::{AgentConfig, EventKind, Snapshot, Store, StoreError, Watch, WatchEvent};
use zkagent_renderer::{TemplateData, TemplateEngine};
use zkagent_sync::{prune, render_jobs, JobOutcome, SyncError, TreeSync, WriteResult};

use crate::command::{run_command, CommandError};
use crate::error::{join_err, DaemonError};

// ---------------------------------------------------------------------------
// Plan
// ---------------------------------------------------------------------------

/// Store work derived from one batch of fired watches.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReloadPlan {
    pub prune: Vec<String>,
    pub resync: Vec<String>,
}

impl ReloadPlan {
    /// Coalesce `events` in arrival order.
    ///
    /// The last event per path decides its action. Paths under a resynced
    /// ancestor are dropped since the ancestor's refetch covers them.
    pub fn from_events(events: &[WatchEvent]) -> Self {
        let mut last: Vec<(&str, EventKind)> = Vec::new();
        for event in events {
            last.retain(|(path, _)| *path != event.path);
            last.push((event.path.as_str(), event.kind));
        }

        let resync: Vec<String> = last
            .iter()
            .filter(|(_, kind)| *kind != EventKind::Deleted)
            .map(|(path, _)| path.to_string())
            .collect();
        let covered = |path: &str| resync.iter().any(|root| is_descendant(path, root));

        let prune = last
            .iter()
            .filter(|(path, kind)| *kind == EventKind::Deleted && !covered(*path))
            .map(|(path, _)| path.to_string())
            .collect();
        let resync = resync
            .iter()
            .filter(|path| !covered(path.as_str()))
            .cloned()
            .collect();
        Self { prune, resync }
    }

    pub fn is_empty(&self) -> bool {
        self.prune.is_empty() && self.resync.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// Outcome of the post-reload command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandReport {
    pub command: String,
    pub success: bool,
    pub output: String,
}

/// Everything one reload did, shared by every event of its batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReloadReport {
    pub resynced: Vec<String>,
    pub pruned: Vec<String>,
    /// Paths whose resync failed with a transient error and must be retried.
    pub retrying: Vec<String>,
    pub written: Vec<PathBuf>,
    pub unchanged: Vec<PathBuf>,
    pub command: Option<CommandReport>,
    pub errors: Vec<String>,
}

impl ReloadReport {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    fn record_writes(&mut self, outcomes: Vec<JobOutcome>) {
        for outcome in outcomes {
            match outcome.result {
                Ok(WriteResult::Written { path }) => self.written.push(path),
                Ok(WriteResult::Unchanged { path } | WriteResult::WouldWrite { path }) => {
                    self.unchanged.push(path)
                }
                Err(err) => self.errors.push(format!(
                    "render {} -> {}: {err}",
                    outcome.job.template.display(),
                    outcome.job.target.display()
                )),
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// Owns the snapshot and drives every sync, render and command run.
pub struct Orchestrator<S: Store + ?Sized> {
    store: Arc<S>,
    config: Arc<AgentConfig>,
    snapshot: Arc<RwLock<Snapshot>>,
    engine: TemplateEngine,
}

impl<S: Store + ?Sized> Orchestrator<S> {
    pub fn new(store: Arc<S>, config: Arc<AgentConfig>) -> Self {
        Self {
            store,
            config,
            snapshot: Arc::new(RwLock::new(Snapshot::new())),
            engine: TemplateEngine::new(),
        }
    }

    pub fn snapshot(&self) -> Arc<RwLock<Snapshot>> {
        Arc::clone(&self.snapshot)
    }

    /// Mirror every root and render every job once.
    ///
    /// Any store or render failure here is fatal; the command is not run.
    pub async fn start(&self) -> Result<Vec<Watch>, DaemonError> {
        let watches = {
            let mut snapshot = self.snapshot.write().await;
            zkagent_sync::sync(self.store.as_ref(), &mut snapshot, &self.config.data_paths).await?
        };
        let nodes = self.snapshot.read().await.len();
        tracing::info!(
            roots = self.config.data_paths.len(),
            nodes,
            watches = watches.len(),
            "initial sync complete"
        );

        let (outcomes, _) = self.render().await?;
        for outcome in outcomes {
            outcome.result?;
        }
        Ok(watches)
    }

    /// Apply `plan`, render, run the command.
    pub async fn reload(&self, plan: &ReloadPlan) -> (ReloadReport, Vec<Watch>) {
        let mut report = ReloadReport::default();
        let mut armed = Vec::new();
        {
            let mut snapshot = self.snapshot.write().await;
            for path in &plan.prune {
                let removed = prune(&mut snapshot, path);
                tracing::debug!(path = %path, removed, "pruned deleted subtree");
                report.pruned.push(path.clone());
            }
            let resync: Vec<String> = plan
                .resync
                .iter()
                .filter(|path| !self.is_orphaned(&snapshot, path))
                .cloned()
                .collect();
            self.resync_into(&mut snapshot, &resync, &mut report, &mut armed)
                .await;
        }
        self.finish(&mut report).await;
        (report, armed)
    }

    /// Resync one path whose earlier resync failed.
    ///
    /// Renders and runs the command only once the path settles.
    pub async fn retry(&self, path: &str) -> (ReloadReport, Vec<Watch>) {
        let mut report = ReloadReport::default();
        let mut armed = Vec::new();
        {
            let mut snapshot = self.snapshot.write().await;
            if !self.is_orphaned(&snapshot, path) {
                let paths = [path.to_string()];
                self.resync_into(&mut snapshot, &paths, &mut report, &mut armed)
                    .await;
            }
        }
        if report.retrying.is_empty() {
            self.finish(&mut report).await;
        }
        (report, armed)
    }

    /// A non-root path whose parent is not mirrored.
    ///
    /// Its parent was deleted or is waiting on a retry that refetches the
    /// whole subtree.
    fn is_orphaned(&self, snapshot: &Snapshot, path: &str) -> bool {
        if self.config.data_paths.iter().any(|root| root == path) {
            return false;
        }
        let orphaned = parent_path(path).is_some_and(|parent| !snapshot.contains(parent));
        if orphaned {
            tracing::debug!(path = %path, "skipping resync under an unmirrored parent");
        }
        orphaned
    }

    /// Drop the whole snapshot and mirror every root again.
    pub async fn rebuild(&self) -> (ReloadReport, Vec<Watch>) {
        let mut report = ReloadReport::default();
        let mut armed = Vec::new();
        {
            let mut snapshot = self.snapshot.write().await;
            snapshot.clear();
            self.resync_into(&mut snapshot, &self.config.data_paths, &mut report, &mut armed)
                .await;
        }
        let nodes = self.snapshot.read().await.len();
        tracing::info!(nodes, "snapshot rebuilt");
        self.finish(&mut report).await;
        (report, armed)
    }

    /// Sync each path independently, recording failures in `report`.
    ///
    /// A missing node counts as deleted. Any other store failure marks the
    /// path for retry.
    async fn resync_into(
        &self,
        snapshot: &mut Snapshot,
        paths: &[String],
        report: &mut ReloadReport,
        armed: &mut Vec<Watch>,
    ) {
        for path in paths {
            let mut pass = TreeSync::new(self.store.as_ref());
            let result = pass.sync(snapshot, std::slice::from_ref(path)).await;
            armed.extend(pass.into_watches());
            match result {
                Ok(()) => report.resynced.push(path.clone()),
                Err(SyncError::Store(StoreError::NoNode { path: missing })) => {
                    tracing::info!(path = %path, missing = %missing, "node vanished during resync");
                    if missing == *path {
                        prune(snapshot, path);
                        report.pruned.push(path.clone());
                    }
                }
                Err(err) => {
                    tracing::warn!(path = %path, error = %err, "resync failed, will retry");
                    report.errors.push(format!("sync {path}: {err}"));
                    report.retrying.push(path.clone());
                }
            }
        }
    }

    async fn finish(&self, report: &mut ReloadReport) {
        let data = match self.render().await {
            Ok((outcomes, data)) => {
                report.record_writes(outcomes);
                data
            }
            Err(err) => {
                report.errors.push(err.to_string());
                return;
            }
        };
        if let Some(command) = self.config.shell_command.as_deref() {
            self.execute(command, &data, report).await;
        }
        if report.is_ok() {
            tracing::info!(
                written = report.written.len(),
                unchanged = report.unchanged.len(),
                "reload complete"
            );
        } else {
            tracing::warn!(errors = report.errors.len(), "reload finished with errors");
        }
    }

    async fn render(&self) -> Result<(Vec<JobOutcome>, TemplateData), DaemonError> {
        let data = TemplateData::from_snapshot(&*self.snapshot.read().await);
        let engine = self.engine.clone();
        let jobs = self.config.jobs.clone();
        let job_data = data.clone();
        let outcomes = tokio::task::spawn_blocking(move || {
            render_jobs(&engine, &jobs, &job_data, false)
        })
        .await
        .map_err(|err| join_err("render", err))?;
        Ok((outcomes, data))
    }

    async fn execute(&self, template: &str, data: &TemplateData, report: &mut ReloadReport) {
        let command = match self.engine.render_str("shellCommand", template, data) {
            Ok(command) => command,
            Err(err) => {
                tracing::warn!(error = %err, "shell command template failed");
                report.errors.push(format!("shell command template: {err}"));
                return;
            }
        };
        if command.trim().is_empty() {
            return;
        }

        let result = run_command(&command).await;
        let entry = match result {
            Ok(out) => {
                tracing::info!(command = %out.command, output = %out.output.trim_end(), "command succeeded");
                CommandReport {
                    command: out.command,
                    success: true,
                    output: out.output,
                }
            }
            Err(CommandError::Failed {
                command,
                status,
                output,
            }) => {
                tracing::warn!(command = %command, %status, output = %output.trim_end(), "command failed");
                report.errors.push(format!("`{command}` failed with {status}"));
                CommandReport {
                    command,
                    success: false,
                    output,
                }
            }
            Err(err @ CommandError::Spawn { .. }) => {
                tracing::warn!(error = %err, "command could not be started");
                report.errors.push(err.to_string());
                CommandReport {
                    command,
                    success: false,
                    output: String::new(),
                }
            }
        };
        report.command = Some(entry);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

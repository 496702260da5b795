use std::sync::Arc;

use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;

use zkagent_core::{AgentConfig, Snapshot, Store};
use zkagent_renderer::{TemplateData, TemplateEngine};
use zkagent_sync::{diff_jobs, render_jobs, FileDiff, JobOutcome};

use crate::error::{io_err, join_err, DaemonError};
use crate::orchestrator::Orchestrator;
use crate::router::{AgentEvent, Router, OUTWARD_CAPACITY};

/// A running agent: the outward event stream plus read access to the mirror.
pub struct Agent {
    events: mpsc::Receiver<AgentEvent>,
    snapshot: Arc<RwLock<Snapshot>>,
    router: JoinHandle<()>,
}

impl Agent {
    /// Next republished notification; `None` once the session has closed.
    pub async fn next_event(&mut self) -> Option<AgentEvent> {
        self.events.recv().await
    }

    pub fn snapshot(&self) -> Arc<RwLock<Snapshot>> {
        Arc::clone(&self.snapshot)
    }

    pub fn into_events(self) -> mpsc::Receiver<AgentEvent> {
        self.events
    }

    /// Stop consuming events and wait for the session to close.
    pub async fn join(self) -> Result<(), DaemonError> {
        let Agent { events, router, .. } = self;
        drop(events);
        router.await.map_err(|err| join_err("router", err))
    }
}

/// Mirror, render, and start routing watches for `config` against `store`.
///
/// Fails when the initial sync or the initial render fails; nothing keeps
/// running in that case.
pub async fn start<S: Store + ?Sized + 'static>(
    store: Arc<S>,
    config: AgentConfig,
) -> Result<Agent, DaemonError> {
    let session = store.session_events();
    let config = Arc::new(config);
    let orchestrator = Orchestrator::new(store, Arc::clone(&config));
    let watches = orchestrator.start().await?;
    let snapshot = orchestrator.snapshot();

    let (tx, events) = mpsc::channel(OUTWARD_CAPACITY);
    let router = Router::new(orchestrator, tx, config.debounce);
    let router = tokio::spawn(router.run(watches, session));
    Ok(Agent {
        events,
        snapshot,
        router,
    })
}

/// Result of [`render_once`].
#[derive(Debug)]
pub enum RenderOnce {
    Rendered(Vec<JobOutcome>),
    Diffs(Vec<FileDiff>),
}

/// One sync and render pass without watching.
///
/// With `dry_run` nothing is written; the unified diffs are returned instead.
pub async fn render_once<S: Store + ?Sized>(
    store: &S,
    config: &AgentConfig,
    dry_run: bool,
) -> Result<RenderOnce, DaemonError> {
    let mut snapshot = Snapshot::new();
    zkagent_sync::sync(store, &mut snapshot, &config.data_paths).await?;
    let data = TemplateData::from_snapshot(&snapshot);
    let engine = TemplateEngine::new();
    let jobs = config.jobs.clone();
    let rendered = tokio::task::spawn_blocking(move || {
        if dry_run {
            diff_jobs(&engine, &jobs, &data).map(RenderOnce::Diffs)
        } else {
            Ok(RenderOnce::Rendered(render_jobs(&engine, &jobs, &data, false)))
        }
    })
    .await
    .map_err(|err| join_err("render", err))?;
    Ok(rendered?)
}

#[cfg(feature = "zookeeper")]
pub async fn connect(config: &AgentConfig) -> Result<Arc<dyn Store>, DaemonError> {
    let servers = config.connect_string();
    let store =
        zkagent_core::zookeeper::ZkStore::connect(&servers, config.session_timeout).await?;
    tracing::info!(servers = %servers, "connected to store");
    Ok(Arc::new(store))
}

#[cfg(not(feature = "zookeeper"))]
pub async fn connect(_config: &AgentConfig) -> Result<Arc<dyn Store>, DaemonError> {
    Err(DaemonError::NoBackend)
}

/// Connect, start the agent and hand every event to `on_event` until the
/// session closes or ctrl-c is received.
pub fn start_blocking<F>(config: AgentConfig, json_logs: bool, mut on_event: F) -> Result<(), DaemonError>
where
    F: FnMut(&AgentEvent),
{
    init_tracing(json_logs);
    build_runtime()?.block_on(async move {
        let store = connect(&config).await?;
        let mut agent = start(store, config).await?;
        loop {
            tokio::select! {
                event = agent.next_event() => match event {
                    Some(event) => on_event(&event),
                    None => break,
                },
                signal = tokio::signal::ctrl_c() => {
                    signal.map_err(|e| io_err("ctrl-c handler", e))?;
                    tracing::info!("received ctrl-c, shutting down agent");
                    break;
                }
            }
        }
        Ok::<(), DaemonError>(())
    })
}

/// Blocking wrapper around [`connect`] + [`render_once`].
pub fn render_once_blocking(config: &AgentConfig, dry_run: bool) -> Result<RenderOnce, DaemonError> {
    init_tracing(false);
    build_runtime()?.block_on(async {
        let store = connect(config).await?;
        render_once(store.as_ref(), config, dry_run).await
    })
}

fn build_runtime() -> Result<tokio::runtime::Runtime, DaemonError> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))
}

/// Install the global subscriber; `RUST_LOG` overrides the `info` default.
pub fn init_tracing(json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    let _ = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}

use std::fs;
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use tokio::time::timeout;

use zkagent_core::{
    AgentConfig, EventKind, MemoryStore, RenderJob, SessionState, StoreError, StoreEvent,
    WatchEvent, WatchKind,
};
use zkagent_daemon::{start, Agent, AgentEvent, DaemonError};

struct Fixture {
    dir: TempDir,
    store: Arc<MemoryStore>,
}

impl Fixture {
    fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        store.create("/app", "1").expect("create /app");
        Self {
            dir: TempDir::new().expect("tempdir"),
            store,
        }
    }

    fn target(&self) -> std::path::PathBuf {
        self.dir.path().join("out.conf")
    }

    fn template(&self) -> std::path::PathBuf {
        self.dir.path().join("out.conf.tera")
    }

    fn config(&self, template: &str, shell_command: Option<String>, debounce_ms: u64) -> AgentConfig {
        fs::write(self.template(), template).expect("write template");
        AgentConfig {
            servers: vec!["127.0.0.1:2181".to_string()],
            data_paths: vec!["/app".to_string()],
            jobs: vec![RenderJob {
                template: self.template(),
                target: self.target(),
            }],
            shell_command,
            session_timeout: Duration::from_secs(10),
            debounce: Duration::from_millis(debounce_ms),
        }
    }

    async fn start(&self, config: AgentConfig) -> Agent {
        start(Arc::clone(&self.store), config).await.expect("agent start")
    }

    fn rendered(&self) -> String {
        fs::read_to_string(self.target()).expect("read target")
    }
}

const VALUE_TEMPLATE: &str = r#"version={{ dat(keys=["/app", "value"]) }}"#;

async fn next(agent: &mut Agent) -> AgentEvent {
    timeout(Duration::from_secs(5), agent.next_event())
        .await
        .expect("event before timeout")
        .expect("stream still open")
}

async fn assert_quiet(agent: &mut Agent) {
    let extra = timeout(Duration::from_millis(300), agent.next_event()).await;
    assert!(extra.is_err(), "unexpected event: {:?}", extra.ok().flatten());
}

fn watch(kind: EventKind, path: &str) -> StoreEvent {
    StoreEvent::Watch(WatchEvent::new(kind, path))
}

#[tokio::test]
async fn every_value_change_is_rendered() {
    let fx = Fixture::new();
    let mut agent = fx.start(fx.config(VALUE_TEMPLATE, None, 10)).await;
    assert_eq!(fx.rendered(), "version=1");

    fx.store.set("/app", "2").expect("set");
    let event = next(&mut agent).await;
    assert_eq!(event.event, watch(EventKind::DataChanged, "/app"));
    let report = event.report.expect("watch events carry a report");
    assert_eq!(report.written, vec![fx.target()]);
    assert_eq!(fx.rendered(), "version=2");

    fx.store.set("/app", "3").expect("set");
    let event = next(&mut agent).await;
    assert_eq!(event.event, watch(EventKind::DataChanged, "/app"));
    assert_eq!(fx.rendered(), "version=3");
}

#[tokio::test]
async fn deleted_child_disappears_from_snapshot_and_render() {
    let fx = Fixture::new();
    fx.store.create("/app/db", "pg").expect("create");
    let config = fx.config(r#"db={{ dat(keys=["/app/db", "value"]) }}"#, None, 200);
    let mut agent = fx.start(config).await;
    assert_eq!(fx.rendered(), "db=pg");

    fx.store.delete("/app/db").expect("delete");
    let mut events = Vec::new();
    for _ in 0..3 {
        events.push(next(&mut agent).await);
    }

    let kinds: Vec<_> = events.iter().map(|e| e.event.clone()).collect();
    assert_eq!(
        kinds.iter().filter(|e| **e == watch(EventKind::Deleted, "/app/db")).count(),
        2
    );
    assert!(kinds.contains(&watch(EventKind::ChildrenChanged, "/app")));

    let first = events[0].report.clone().expect("report");
    assert!(
        events.iter().all(|e| e.report.as_ref().is_some_and(|r| Arc::ptr_eq(r, &first))),
        "one batch, one reload"
    );
    assert!(!agent.snapshot().read().await.contains("/app/db"));
    assert_eq!(fx.rendered(), "db=");
    assert_quiet(&mut agent).await;
}

#[tokio::test]
async fn resync_does_not_double_arm_watches() {
    let fx = Fixture::new();
    let mut agent = fx.start(fx.config(VALUE_TEMPLATE, None, 10)).await;

    fx.store.set("/app", "2").expect("set");
    next(&mut agent).await;

    fx.store.create("/app/new", "").expect("create");
    let event = next(&mut agent).await;
    assert_eq!(event.event, watch(EventKind::ChildrenChanged, "/app"));
    assert_quiet(&mut agent).await;
    assert!(agent.snapshot().read().await.contains("/app/new"));
}

#[tokio::test]
async fn reload_errors_are_reported_and_processing_continues() {
    let fx = Fixture::new();
    let mut agent = fx.start(fx.config(VALUE_TEMPLATE, None, 10)).await;

    fs::write(fx.template(), "{{ broken").expect("break template");
    fx.store.set("/app", "2").expect("set");
    let report = next(&mut agent).await.report.expect("report");
    assert_eq!(report.errors.len(), 1);
    assert_eq!(fx.rendered(), "version=1", "failed render leaves target untouched");

    fs::write(fx.template(), VALUE_TEMPLATE).expect("fix template");
    fx.store.set("/app", "3").expect("set");
    let report = next(&mut agent).await.report.expect("report");
    assert!(report.is_ok());
    assert_eq!(fx.rendered(), "version=3");
}

async fn eventually(mut done: impl FnMut() -> bool) {
    timeout(Duration::from_secs(5), async {
        while !done() {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("condition reached before timeout");
}

#[tokio::test]
async fn failed_resync_is_retried_until_the_path_is_watched_again() {
    let fx = Fixture::new();
    let mut agent = fx.start(fx.config(VALUE_TEMPLATE, None, 200)).await;

    fx.store.set("/app", "2").expect("set");
    fx.store.fail_path("/app", StoreError::ConnectionLoss);
    let report = next(&mut agent).await.report.expect("report");
    assert_eq!(report.errors.len(), 1, "{:?}", report.errors);
    assert_eq!(report.retrying, vec!["/app"]);
    assert_eq!(fx.rendered(), "version=");

    fx.store.clear_failure("/app");
    eventually(|| fx.store.armed_watches("/app", WatchKind::Data) == 1).await;
    eventually(|| fx.rendered() == "version=2").await;

    fx.store.set("/app", "3").expect("set");
    let event = next(&mut agent).await;
    assert_eq!(event.event, watch(EventKind::DataChanged, "/app"));
    assert_eq!(fx.rendered(), "version=3");
    assert_quiet(&mut agent).await;
}

#[tokio::test]
async fn vanished_root_is_not_retried() {
    let fx = Fixture::new();
    let mut agent = fx.start(fx.config(VALUE_TEMPLATE, None, 10)).await;

    fx.store.delete("/app").expect("delete");
    let report = next(&mut agent).await.report.expect("report");
    assert!(report.retrying.is_empty());
    assert!(report.is_ok(), "{:?}", report.errors);
    assert!(!agent.snapshot().read().await.contains("/app"));
    assert_eq!(fx.rendered(), "version=");
}

#[cfg(unix)]
#[tokio::test]
async fn shell_command_runs_after_each_reload() {
    let fx = Fixture::new();
    let marker = fx.dir.path().join("reloads.log");
    let command = format!(
        r#"echo {{{{ dat(keys=["/app", "value"]) }}}} >> {}"#,
        marker.display()
    );
    let mut agent = fx.start(fx.config(VALUE_TEMPLATE, Some(command), 10)).await;
    assert!(!marker.exists());

    fx.store.set("/app", "2").expect("set");
    let report = next(&mut agent).await.report.expect("report");
    assert!(report.command.as_ref().is_some_and(|c| c.success));

    fx.store.set("/app", "3").expect("set");
    next(&mut agent).await;
    assert_eq!(fs::read_to_string(&marker).expect("marker"), "2\n3\n");
}

#[tokio::test]
async fn session_expiry_rebuilds_and_rearms() {
    let fx = Fixture::new();
    let mut agent = fx.start(fx.config(VALUE_TEMPLATE, None, 10)).await;

    fx.store.expire();
    let event = next(&mut agent).await;
    assert_eq!(
        event.event,
        StoreEvent::Session {
            state: SessionState::Expired
        }
    );
    assert_eq!(event.report.expect("rebuild report").resynced, vec!["/app"]);

    fx.store.set("/app", "9").expect("set");
    let event = next(&mut agent).await;
    assert_eq!(event.event, watch(EventKind::DataChanged, "/app"));
    assert_eq!(fx.rendered(), "version=9");
}

#[tokio::test]
async fn session_states_are_republished_without_reload() {
    let fx = Fixture::new();
    let mut agent = fx.start(fx.config(VALUE_TEMPLATE, None, 10)).await;

    fx.store.publish(SessionState::Disconnected);
    let event = next(&mut agent).await;
    assert_eq!(
        event.event,
        StoreEvent::Session {
            state: SessionState::Disconnected
        }
    );
    assert!(event.report.is_none());
    assert_eq!(event.to_string(), "Session: Disconnected");
}

#[tokio::test]
async fn closing_the_session_ends_the_stream() {
    let fx = Fixture::new();
    let mut agent = fx.start(fx.config(VALUE_TEMPLATE, None, 10)).await;

    fx.store.close();
    let end = timeout(Duration::from_secs(5), agent.next_event())
        .await
        .expect("stream ends before timeout");
    assert!(end.is_none());
    agent.join().await.expect("router exits cleanly");
}

#[tokio::test]
async fn missing_root_fails_start() {
    let fx = Fixture::new();
    let mut config = fx.config(VALUE_TEMPLATE, None, 10);
    config.data_paths = vec!["/missing".to_string()];
    let err = start(Arc::clone(&fx.store), config).await.err().expect("start fails");
    assert!(matches!(err, DaemonError::Sync(_)));
}

#[tokio::test]
async fn events_serialize_as_json_lines() {
    let fx = Fixture::new();
    let mut agent = fx.start(fx.config(VALUE_TEMPLATE, None, 10)).await;

    fx.store.set("/app", "2").expect("set");
    let event = next(&mut agent).await;
    let json = serde_json::to_value(&event).expect("serialize");
    assert_eq!(json["event"]["type"], "watch");
    assert_eq!(json["event"]["kind"], "data_changed");
    assert_eq!(json["event"]["path"], "/app");
    assert!(json["report"]["written"].is_array());
    assert_eq!(json["dropped"], 0);
}

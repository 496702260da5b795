use std::path::PathBuf;

use thiserror::Error;

/// Error surface for the agent runtime.
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("config error: {0}")]
    Config(#[from] zkagent_core::ConfigError),

    #[error("store error: {0}")]
    Store(#[from] zkagent_core::StoreError),

    #[error("sync error: {0}")]
    Sync(#[from] zkagent_sync::SyncError),

    #[error("{task} task join failure: {reason}")]
    Join { task: &'static str, reason: String },

    #[error("no store backend compiled in; rebuild with `--features zookeeper`")]
    NoBackend,
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> DaemonError {
    DaemonError::Io {
        path: path.into(),
        source,
    }
}

pub(crate) fn join_err(task: &'static str, err: tokio::task::JoinError) -> DaemonError {
    DaemonError::Join {
        task,
        reason: err.to_string(),
    }
}

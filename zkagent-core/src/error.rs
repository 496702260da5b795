//! Error types for zkagent-core.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by a coordination store client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The node does not exist (or was deleted between two fetches).
    #[error("no such node: {path}")]
    NoNode { path: String },

    /// A node with this path already exists.
    #[error("node already exists: {path}")]
    NodeExists { path: String },

    /// The node still has children and cannot be deleted.
    #[error("node has children: {path}")]
    NotEmpty { path: String },

    /// The session is not allowed to read the node.
    #[error("permission denied: {path}")]
    NoAuth { path: String },

    /// The path is not absolute or contains empty segments.
    #[error("invalid node path '{path}'")]
    BadPath { path: String },

    /// Connecting to the ensemble failed.
    #[error("failed to connect to {servers}: {reason}")]
    Connect { servers: String, reason: String },

    /// The connection dropped while a request was in flight.
    #[error("connection lost")]
    ConnectionLoss,

    /// The session expired; every watch of the session is gone.
    #[error("session expired")]
    SessionExpired,

    /// The client has been closed.
    #[error("store client closed")]
    Closed,

    /// Any other client-reported failure.
    #[error("store error: {0}")]
    Other(String),
}

/// All errors that can arise while loading or validating agent configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON parse error.
    #[error("failed to parse JSON config: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parse error.
    #[error("failed to parse YAML config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// The top-level document is not an object.
    #[error("config must be an object with `zkServer`, `zkDataPath` and `combine` keys")]
    NotAnObject,

    /// A required key is absent or empty.
    #[error("missing required config key `{0}`")]
    MissingKey(&'static str),

    /// A key holds a value of the wrong type.
    #[error("invalid `{key}` format: expected {expected}")]
    InvalidType {
        key: &'static str,
        expected: &'static str,
    },

    /// A `combine` entry is not `<template>#<target>`.
    #[error("invalid `combine` format '{entry}': expected \"<templatePath>#<targetPath>\"")]
    InvalidCombine { entry: String },

    /// A `zkDataPath` entry is not an absolute store path.
    #[error("invalid `zkDataPath` entry '{path}': store paths must be absolute")]
    InvalidDataPath { path: String },
}

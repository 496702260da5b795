//! Agent configuration.
//!
//! ```json
//! {
//!   "zkServer": ["zk1:2181", "zk2:2181"],
//!   "zkDataPath": "/app",
//!   "combine": ["app.conf.tera#/etc/app.conf"],
//!   "shellCommand": "systemctl reload app"
//! }
//! ```
//!
//! Every list-valued key also accepts a single string. Validation happens
//! entirely here, before any store connection is attempted.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Serialize;
use serde_json::{Map, Value as Json};

use crate::error::ConfigError;

pub const DEFAULT_SESSION_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(100);

/// A `(template, target)` rendering instruction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderJob {
    pub template: PathBuf,
    pub target: PathBuf,
}

impl RenderJob {
    /// Parse a `"<templatePath>#<targetPath>"` entry.
    pub fn parse(entry: &str) -> Result<Self, ConfigError> {
        let invalid = || ConfigError::InvalidCombine {
            entry: entry.to_string(),
        };
        let mut parts = entry.split('#');
        let (Some(template), Some(target), None) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(invalid());
        };
        let (template, target) = (template.trim(), target.trim());
        if template.is_empty() || target.is_empty() {
            return Err(invalid());
        }
        Ok(Self {
            template: PathBuf::from(template),
            target: PathBuf::from(target),
        })
    }
}

/// Validated agent configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgentConfig {
    /// Store endpoints (`host:port`).
    pub servers: Vec<String>,
    /// Root store paths to mirror.
    pub data_paths: Vec<String>,
    pub jobs: Vec<RenderJob>,
    /// Command template run after every reload; `None` when unset or empty.
    pub shell_command: Option<String>,
    pub session_timeout: Duration,
    /// Window in which notifications are coalesced into one reload.
    pub debounce: Duration,
}

impl AgentConfig {
    /// Read and validate a config file. `.yaml` / `.yml` files are parsed as
    /// YAML, anything else as JSON.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let is_yaml = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"))
            .unwrap_or(false);
        let doc: Json = if is_yaml {
            serde_yaml::from_str(&contents)?
        } else {
            serde_json::from_str(&contents)?
        };
        Self::from_json(&doc)
    }

    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        Self::from_json(&serde_json::from_str(s)?)
    }

    pub fn from_json(doc: &Json) -> Result<Self, ConfigError> {
        let obj = doc.as_object().ok_or(ConfigError::NotAnObject)?;

        let servers = string_list(obj, "zkServer")?;
        if servers.is_empty() {
            return Err(ConfigError::MissingKey("zkServer"));
        }

        let data_paths = string_list(obj, "zkDataPath")?;
        if data_paths.is_empty() {
            return Err(ConfigError::MissingKey("zkDataPath"));
        }
        for path in &data_paths {
            if crate::types::validate_path(path).is_err() {
                return Err(ConfigError::InvalidDataPath { path: path.clone() });
            }
        }

        let jobs = string_list(obj, "combine")?
            .iter()
            .map(|entry| RenderJob::parse(entry))
            .collect::<Result<Vec<_>, _>>()?;

        let shell_command = match obj.get("shellCommand") {
            None | Some(Json::Null) => None,
            Some(Json::String(s)) if s.trim().is_empty() => None,
            Some(Json::String(s)) => Some(s.clone()),
            Some(_) => {
                return Err(ConfigError::InvalidType {
                    key: "shellCommand",
                    expected: "a string",
                })
            }
        };

        let session_timeout =
            millis(obj, "sessionTimeoutMs")?.unwrap_or(DEFAULT_SESSION_TIMEOUT);
        let debounce = millis(obj, "debounceMs")?.unwrap_or(DEFAULT_DEBOUNCE);

        Ok(Self {
            servers,
            data_paths,
            jobs,
            shell_command,
            session_timeout,
            debounce,
        })
    }

    /// Comma-joined connect string (`zk1:2181,zk2:2181`).
    pub fn connect_string(&self) -> String {
        self.servers.join(",")
    }
}

fn string_list(obj: &Map<String, Json>, key: &'static str) -> Result<Vec<String>, ConfigError> {
    let invalid = || ConfigError::InvalidType {
        key,
        expected: "a string or an array of strings",
    };
    match obj.get(key) {
        None | Some(Json::Null) => Ok(Vec::new()),
        Some(Json::String(s)) => Ok(vec![s.clone()]),
        Some(Json::Array(items)) => items
            .iter()
            .map(|item| item.as_str().map(str::to_owned).ok_or_else(invalid))
            .collect(),
        Some(_) => Err(invalid()),
    }
}

fn millis(obj: &Map<String, Json>, key: &'static str) -> Result<Option<Duration>, ConfigError> {
    match obj.get(key) {
        None | Some(Json::Null) => Ok(None),
        Some(value) => value
            .as_u64()
            .map(|ms| Some(Duration::from_millis(ms)))
            .ok_or(ConfigError::InvalidType {
                key,
                expected: "a non-negative integer (milliseconds)",
            }),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

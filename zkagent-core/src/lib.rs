//! zkagent core library: node types, snapshot, structured values, store
//! interface, configuration, errors.
//!
//! - [`types`]: [`Node`], [`Stat`] and store-path helpers
//! - [`snapshot`]: [`Snapshot`]
//! - [`value`]: [`Value`] and the key-walking accessor
//! - [`store`]: [`Store`] trait, watches and events
//! - [`memory`]: [`MemoryStore`]
//! - [`config`]: [`AgentConfig`]
//! - [`error`]: [`StoreError`], [`ConfigError`]

pub mod config;
pub mod error;
pub mod memory;
pub mod snapshot;
pub mod store;
pub mod types;
pub mod value;
#[cfg(feature = "zookeeper")]
pub mod zookeeper;

pub use config::{AgentConfig, RenderJob};
pub use error::{ConfigError, StoreError};
pub use memory::MemoryStore;
pub use snapshot::Snapshot;
pub use store::{
    EventKind, SessionState, Store, StoreEvent, Watch, WatchEvent, WatchKind,
};
pub use types::{join_path, Node, Stat};
pub use value::{Record, Value};

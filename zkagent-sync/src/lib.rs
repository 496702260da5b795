//! # zkagent-sync
//!
//! Subtree mirroring into a [`zkagent_core::Snapshot`], stale-entry pruning,
//! and the render-then-atomically-write pipeline for render jobs.
//!
//! Call [`sync`] to mirror store roots, [`render_jobs`] to materialise every
//! target, or [`diff_jobs`] to preview changes without writing.

pub mod diff;
pub mod error;
pub mod pipeline;
pub mod tree;
pub mod writer;

pub use diff::{diff_jobs, FileDiff};
pub use error::SyncError;
pub use pipeline::{render_job, render_jobs, JobOutcome};
pub use tree::{prune, sync, TreeSync};
pub use writer::{atomic_write, WriteResult};

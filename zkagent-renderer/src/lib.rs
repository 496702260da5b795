//! # zkagent-renderer
//!
//! Tera-based template engine that renders config files from a mirrored
//! store snapshot, with the `dat` key-walking accessor available inside every
//! template.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::path::Path;
//! use zkagent_core::Snapshot;
//! use zkagent_renderer::{TemplateData, TemplateEngine};
//!
//! fn render(snapshot: &Snapshot) {
//!     let engine = TemplateEngine::new();
//!     let data = TemplateData::from_snapshot(snapshot);
//!     if let Ok(out) = engine.render_file(Path::new("app.conf.tera"), &data) {
//!         println!("{out}");
//!     }
//! }
//! ```

pub mod context;
pub mod engine;
pub mod error;

pub use context::TemplateData;
pub use engine::{TemplateEngine, ACCESSOR_NAME};
pub use error::RenderError;

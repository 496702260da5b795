//! Template data: the structured root a template renders against.

use std::sync::Arc;

use zkagent_core::{Snapshot, Value};

use crate::error::RenderError;

/// Data root shared by the `dat` accessor and the tera context.
///
/// Exposed to templates as:
/// - `root`: the whole data root (for a snapshot, `path → node`)
/// - `paths`: sorted top-level keys when the root is a map
/// - `dat(keys=[…])`: key walk starting at `root`
#[derive(Debug, Clone)]
pub struct TemplateData {
    root: Arc<Value>,
}

impl TemplateData {
    /// Build from a snapshot: `path → { path, stat, children, value }`.
    pub fn from_snapshot(snapshot: &Snapshot) -> Self {
        Self::from_value(snapshot.to_value())
    }

    pub fn from_value(root: Value) -> Self {
        Self {
            root: Arc::new(root),
        }
    }

    pub fn root(&self) -> &Value {
        &self.root
    }

    pub(crate) fn shared_root(&self) -> Arc<Value> {
        Arc::clone(&self.root)
    }

    /// Sorted top-level keys, empty for non-map roots.
    pub fn paths(&self) -> Vec<String> {
        match self.root.deref_all() {
            Value::Map(map) => map.keys().cloned().collect(),
            _ => Vec::new(),
        }
    }

    /// Convert to a [`tera::Context`] for rendering.
    pub fn to_tera_context(&self) -> Result<tera::Context, RenderError> {
        let mut ctx = tera::Context::new();
        ctx.try_insert("root", self.root.as_ref())?;
        ctx.try_insert("paths", &self.paths())?;
        Ok(ctx)
    }
}

impl From<&Snapshot> for TemplateData {
    fn from(snapshot: &Snapshot) -> Self {
        Self::from_snapshot(snapshot)
    }
}

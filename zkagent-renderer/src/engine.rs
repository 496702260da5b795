//! Tera rendering engine with the `dat` accessor registered.
//!
//! | Form                          | Walk starts at          |
//! |-------------------------------|-------------------------|
//! | `{{ dat(keys=["/app", "value"]) }}` | the data root     |
//! | `{{ x \| dat(keys=["value"]) }}`    | the piped value   |
//!
//! A walk that fails at any step yields `null`, which tera renders as empty
//! output. Numeric keys are stringified, so `keys=["/app", "children", 0]`
//! indexes the first child.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tera::Tera;

use zkagent_core::Value;

use crate::context::TemplateData;
use crate::error::RenderError;

/// Name the accessor is registered under, both as function and filter.
pub const ACCESSOR_NAME: &str = "dat";

// ---------------------------------------------------------------------------
// Accessor glue
// ---------------------------------------------------------------------------

fn keys_arg(args: &HashMap<String, tera::Value>) -> tera::Result<Vec<String>> {
    let keys = args
        .get("keys")
        .ok_or_else(|| tera::Error::msg("`dat` requires a `keys` argument, e.g. dat(keys=[\"/app\", \"value\"])"))?;
    let items = match keys {
        tera::Value::Array(items) => items.as_slice(),
        tera::Value::String(_) => std::slice::from_ref(keys),
        _ => return Err(tera::Error::msg("`dat` argument `keys` must be a list of strings")),
    };
    items
        .iter()
        .map(|key| match key {
            tera::Value::String(s) => Ok(s.clone()),
            tera::Value::Number(n) => Ok(n.to_string()),
            other => Err(tera::Error::msg(format!(
                "`dat` keys must be strings or numbers, got {other}"
            ))),
        })
        .collect()
}

fn resolve_json(root: &Value, keys: &[String]) -> tera::Value {
    root.resolve(keys)
        .map(Value::to_json)
        .unwrap_or(tera::Value::Null)
}

fn register_accessor(tera: &mut Tera, root: Arc<Value>) {
    tera.register_function(
        ACCESSOR_NAME,
        move |args: &HashMap<String, tera::Value>| -> tera::Result<tera::Value> {
            let keys = keys_arg(args)?;
            Ok(resolve_json(&root, &keys))
        },
    );
    tera.register_filter(
        ACCESSOR_NAME,
        |value: &tera::Value, args: &HashMap<String, tera::Value>| -> tera::Result<tera::Value> {
            let keys = keys_arg(args)?;
            Ok(resolve_json(&Value::from(value), &keys))
        },
    );
}

fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> RenderError {
    RenderError::Io {
        path: path.into(),
        source,
    }
}

// ---------------------------------------------------------------------------
// TemplateEngine
// ---------------------------------------------------------------------------

/// Renders user templates against [`TemplateData`].
///
/// Templates are compiled per render: they are read from disk each time so
/// edits to a template take effect on the next reload. Autoescaping is off;
/// targets are config files, not HTML.
#[derive(Debug, Clone, Default)]
pub struct TemplateEngine {
    _private: (),
}

impl TemplateEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Render template `source` registered under `name`.
    pub fn render_str(
        &self,
        name: &str,
        source: &str,
        data: &TemplateData,
    ) -> Result<String, RenderError> {
        let mut tera = Tera::default();
        tera.autoescape_on(vec![]);
        register_accessor(&mut tera, data.shared_root());
        tera.add_raw_template(name, source)?;
        let ctx = data.to_tera_context()?;
        Ok(tera.render(name, &ctx)?)
    }

    /// Read `template` from disk and render it.
    pub fn render_file(&self, template: &Path, data: &TemplateData) -> Result<String, RenderError> {
        let source = std::fs::read_to_string(template).map_err(|e| io_err(template, e))?;
        let name = template
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "template".to_string());
        self.render_str(&name, &source, data)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn data(json: serde_json::Value) -> TemplateData {
        TemplateData::from_value(Value::from(json))
    }

    #[test]
    fn dat_function_walks_root() {
        let engine = TemplateEngine::new();
        let out = engine
            .render_str("t", r#"{{ dat(keys=["a", "b"]) }}"#, &data(json!({"a": {"b": "v"}})))
            .expect("render");
        assert_eq!(out, "v");
    }

    #[test]
    fn missing_key_renders_empty() {
        let engine = TemplateEngine::new();
        let out = engine
            .render_str("t", r#"{{ dat(keys=["a", "b"]) }}"#, &data(json!({"a": {}})))
            .expect("nil must render as empty, not fail");
        assert_eq!(out, "");
    }

    #[test]
    fn numeric_keys_index_sequences() {
        let engine = TemplateEngine::new();
        let out = engine
            .render_str(
                "t",
                r#"{{ dat(keys=["list", 1]) }}|{{ dat(keys=["list", "7"]) }}"#,
                &data(json!({"list": ["x", "y"]})),
            )
            .expect("render");
        assert_eq!(out, "y|");
    }

    #[test]
    fn dat_filter_walks_piped_value() {
        let engine = TemplateEngine::new();
        let out = engine
            .render_str(
                "t",
                r#"{% for item in root.items %}{{ item | dat(keys=["name"]) }};{% endfor %}"#,
                &data(json!({"items": [{"name": "a"}, {"other": 1}, {"name": "c"}]})),
            )
            .expect("render");
        assert_eq!(out, "a;;c;");
    }

    #[test]
    fn missing_keys_argument_is_a_template_error() {
        let engine = TemplateEngine::new();
        let err = engine
            .render_str("t", "{{ dat() }}", &data(json!({})))
            .unwrap_err();
        assert!(matches!(err, RenderError::Tera(_)));
    }

    #[test]
    fn syntax_error_is_reported() {
        let engine = TemplateEngine::new();
        let err = engine
            .render_str("t", "{{ unclosed", &data(json!({})))
            .unwrap_err();
        assert!(matches!(err, RenderError::Tera(_)));
    }

    #[test]
    fn html_targets_are_not_escaped() {
        let engine = TemplateEngine::new();
        let out = engine
            .render_str("page.html", r#"{{ dat(keys=["v"]) }}"#, &data(json!({"v": "<a&b>"})))
            .expect("render");
        assert_eq!(out, "<a&b>");
    }

    #[test]
    fn render_file_reports_missing_template() {
        let engine = TemplateEngine::new();
        let err = engine
            .render_file(Path::new("/definitely/not/here.tera"), &data(json!({})))
            .unwrap_err();
        assert!(matches!(err, RenderError::Io { .. }));
    }
}

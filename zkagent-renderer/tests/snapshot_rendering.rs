use std::fs;

use tempfile::TempDir;
use zkagent_core::{Node, Snapshot, Stat};
use zkagent_renderer::{RenderError, TemplateData, TemplateEngine};

fn node(path: &str, value: &str, children: &[&str], version: i32) -> Node {
    Node {
        path: path.to_string(),
        stat: Stat {
            version,
            num_children: children.len() as i32,
            ..Stat::default()
        },
        children: children.iter().map(|c| c.to_string()).collect(),
        value: value.as_bytes().to_vec(),
    }
}

fn app_snapshot() -> Snapshot {
    let mut snapshot = Snapshot::new();
    snapshot.insert(node("/app", "1", &["db", "cache"], 4));
    snapshot.insert(node("/app/db", "postgres://db:5432", &[], 0));
    snapshot.insert(node("/app/cache", "redis://cache:6379", &[], 2));
    snapshot
}

#[test]
fn template_file_renders_node_values() {
    let dir = TempDir::new().expect("tempdir");
    let template = dir.path().join("app.conf.tera");
    fs::write(
        &template,
        "version={{ dat(keys=[\"/app\", \"value\"]) }}\n\
         db={{ dat(keys=[\"/app/db\", \"value\"]) }}\n\
         data_version={{ dat(keys=[\"/app\", \"stat\", \"version\"]) }}\n",
    )
    .expect("write template");

    let out = TemplateEngine::new()
        .render_file(&template, &TemplateData::from_snapshot(&app_snapshot()))
        .expect("render");
    assert_eq!(
        out,
        "version=1\ndb=postgres://db:5432\ndata_version=4\n"
    );
}

#[test]
fn children_can_be_iterated_through_root() {
    let template = r#"{% for child in root["/app"].children %}{% set p = "/app/" ~ child %}{{ child }}={{ dat(keys=[p, "value"]) }};{% endfor %}"#;
    let out = TemplateEngine::new()
        .render_str("children", template, &TemplateData::from_snapshot(&app_snapshot()))
        .expect("render");
    assert_eq!(out, "db=postgres://db:5432;cache=redis://cache:6379;");
}

#[test]
fn paths_lists_every_mirrored_node() {
    let out = TemplateEngine::new()
        .render_str(
            "paths",
            "{{ paths | join(sep=\",\") }}",
            &TemplateData::from_snapshot(&app_snapshot()),
        )
        .expect("render");
    assert_eq!(out, "/app,/app/cache,/app/db");
}

#[test]
fn removed_node_renders_as_empty() {
    let mut snapshot = app_snapshot();
    snapshot.remove("/app/cache");
    let out = TemplateEngine::new()
        .render_str(
            "gone",
            r#"cache=[{{ dat(keys=["/app/cache", "value"]) }}]"#,
            &TemplateData::from_snapshot(&snapshot),
        )
        .expect("render");
    assert_eq!(out, "cache=[]");
}

#[test]
fn undefined_variable_is_an_error_not_empty_output() {
    let err = TemplateEngine::new()
        .render_str("bad", "{{ nope }}", &TemplateData::from_snapshot(&app_snapshot()))
        .unwrap_err();
    assert!(matches!(err, RenderError::Tera(_)));
    assert!(err.to_string().contains("template engine error"));
}

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::str::contains;
use tempfile::TempDir;

fn zkagent_cmd(dir: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("zkagent"));
    cmd.current_dir(dir).env("NO_COLOR", "1");
    cmd
}

fn write_config(dir: &TempDir, body: &str) -> PathBuf {
    let path = dir.path().join("config.json");
    fs::write(&path, body).expect("write config");
    path
}

#[test]
fn check_lists_render_jobs() {
    let dir = TempDir::new().expect("dir");
    fs::write(dir.path().join("app.tera"), "x").expect("template");
    write_config(
        &dir,
        r#"{
            "zkServer": ["zk1:2181", "zk2:2181"],
            "zkDataPath": "/app",
            "combine": ["app.tera#app.conf", "missing.tera#other.conf"],
            "shellCommand": "nginx -s reload"
        }"#,
    );

    zkagent_cmd(dir.path())
        .arg("check")
        .assert()
        .success()
        .stdout(contains("zk1:2181,zk2:2181"))
        .stdout(contains("nginx -s reload"))
        .stdout(contains("app.tera"))
        .stdout(contains("other.conf"));
}

#[test]
fn check_rejects_combine_without_separator() {
    let dir = TempDir::new().expect("dir");
    write_config(
        &dir,
        r#"{"zkServer": "zk:2181", "zkDataPath": "/app", "combine": "bad-format-no-hash"}"#,
    );

    zkagent_cmd(dir.path())
        .arg("check")
        .assert()
        .failure()
        .stderr(contains("invalid `combine` format"));
}

#[test]
fn check_accepts_yaml_config() {
    let dir = TempDir::new().expect("dir");
    let path = dir.path().join("agent.yaml");
    fs::write(
        &path,
        "zkServer: zk:2181\nzkDataPath:\n  - /app\n  - /shared\ncombine: a.tera#a.conf\n",
    )
    .expect("write yaml");

    zkagent_cmd(dir.path())
        .args(["check", "--config"])
        .arg(&path)
        .assert()
        .success()
        .stdout(contains("/app, /shared"));
}

#[test]
fn missing_config_file_is_reported() {
    let dir = TempDir::new().expect("dir");
    zkagent_cmd(dir.path())
        .arg("check")
        .assert()
        .failure()
        .stderr(contains("config.json"));
}

#[test]
fn run_fails_on_invalid_config_before_connecting() {
    let dir = TempDir::new().expect("dir");
    write_config(&dir, r#"{"zkServer": "zk:2181", "zkDataPath": "relative/path"}"#);

    zkagent_cmd(dir.path())
        .arg("run")
        .assert()
        .failure()
        .stderr(contains("zkDataPath"));
}

#[cfg(not(feature = "zookeeper"))]
#[test]
fn render_without_backend_explains_feature() {
    let dir = TempDir::new().expect("dir");
    write_config(
        &dir,
        r#"{"zkServer": "zk:2181", "zkDataPath": "/app", "combine": "a.tera#a.conf"}"#,
    );

    zkagent_cmd(dir.path())
        .args(["render", "--dry-run"])
        .assert()
        .failure()
        .stderr(contains("--features zookeeper"));
    assert!(!dir.path().join("a.conf").exists());
}

#[test]
fn help_lists_subcommands() {
    let dir = TempDir::new().expect("dir");
    zkagent_cmd(dir.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(contains("run"))
        .stdout(contains("check"))
        .stdout(contains("render"));
}

use assert_cmd::Command;
use predicates::prelude::*;

use crate::common::TestWorkspace;

fn fab(ws: &TestWorkspace) -> Command {
    let mut cmd = Command::cargo_bin("fab").unwrap();
    cmd.current_dir(ws.root()).env("FAB_CONFIG", ws.path("fab.toml")).env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_install_then_generate() {
    let ws = TestWorkspace::new().unwrap();
    ws.write_file("fab.toml", "ssh_agent = false\ngit_timeout_secs = 60\n").unwrap();
    ws.write_component(
        ".",
        "name: root\nsubcomponents:\n  - name: web\n    type: static\n    method: local\n    source: ./web\n",
    )
    .unwrap();
    ws.write_file("web/svc.yaml", "kind: Service\n").unwrap();

    fab(&ws)
        .arg("install")
        .assert()
        .success()
        .stdout(predicate::str::contains("Installed 2 component(s)"));
    assert!(ws.path("_install.lock.json").is_file());

    fab(&ws)
        .arg("generate")
        .assert()
        .success()
        .stdout(predicate::str::contains("root_web.yaml").and(predicate::str::contains("Generated 1 manifest(s)")));
    assert_eq!(ws.read("_generated/root_web.yaml").unwrap(), "kind: Service\n");
}

#[test]
fn test_quiet_install_prints_nothing() {
    let ws = TestWorkspace::new().unwrap();
    ws.write_component(".", "name: root\n").unwrap();
    fab(&ws).args(["--quiet", "install"]).assert().success().stdout(predicate::str::is_empty());
}

#[test]
fn test_missing_definition_exits_with_error() {
    let ws = TestWorkspace::new().unwrap();
    fab(&ws)
        .args(["install", "nowhere"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("error"));
}

#[test]
fn test_invalid_config_file_is_reported() {
    let ws = TestWorkspace::new().unwrap();
    ws.write_file("fab.toml", "git_timeout_secs = \"soon\"\n").unwrap();
    ws.write_component(".", "name: root\n").unwrap();
    fab(&ws).arg("install").assert().failure().code(1);
}

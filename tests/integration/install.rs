use fab_cli::cache::CloneCoordinator;
use fab_cli::core::{ErrorCategory, FabError, error_category};
use fab_cli::lockfile::InstallReport;
use std::path::Path;
use std::sync::Arc;

use crate::common::TestWorkspace;

fn logical_paths(report: &InstallReport) -> Vec<String> {
    report.components.iter().map(|(logical, _)| logical.to_string()).collect()
}

#[tokio::test]
async fn test_install_twice_writes_identical_report() {
    let ws = TestWorkspace::new().unwrap();
    ws.write_component(
        ".",
        concat!(
            "name: root\n",
            "subcomponents:\n",
            "  - name: apps\n    method: local\n    source: ./apps\n",
            "  - name: web\n    type: static\n    path: web\n",
        ),
    )
    .unwrap();
    ws.write_component("apps", "name: apps-root\nsubcomponents:\n  - name: api\n").unwrap();
    ws.write_file("web/service.yaml", "kind: Service\n").unwrap();

    ws.installer().unwrap().install(Path::new(".")).await.unwrap();
    let first = ws.read("_install.lock.json").unwrap();
    ws.installer().unwrap().install(Path::new(".")).await.unwrap();
    let second = ws.read("_install.lock.json").unwrap();

    assert_eq!(first, second);
    let report = InstallReport::load(&ws.path("_install.lock.json")).unwrap();
    assert_eq!(
        logical_paths(&report),
        ["root", "root/apps", "root/web", "root/apps/apps-root", "root/apps/apps-root/api"]
    );
    assert_eq!(report.physical_path("root/apps/apps-root/api"), Some(Path::new("_components/_local/apps")));
    assert!(first.contains("\"_notes\""));
    assert!(first.contains("Order of components matters"));
}

#[tokio::test]
async fn test_duplicate_logical_path_is_fatal_and_writes_no_report() {
    let ws = TestWorkspace::new().unwrap();
    ws.write_component(
        ".",
        concat!(
            "name: root\n",
            "subcomponents:\n",
            "  - name: app\n    method: local\n    source: ./one\n",
            "  - name: app\n    method: local\n    source: ./two\n",
        ),
    )
    .unwrap();
    ws.write_component("one", "name: inner\n").unwrap();
    ws.write_component("two", "name: inner\n").unwrap();

    let err = ws.installer().unwrap().install(Path::new(".")).await.unwrap_err();
    assert_eq!(error_category(&err), Some(ErrorCategory::Consistency));
    assert!(matches!(
        err.downcast_ref::<FabError>(),
        Some(FabError::DuplicateLogicalPath { logical_path, .. }) if logical_path == "root/app"
    ));
    assert!(!ws.path("_install.lock.json").exists());
}

#[tokio::test]
async fn test_same_destination_is_fetched_once_and_collapsed() {
    let ws = TestWorkspace::new().unwrap();
    ws.write_component(
        ".",
        concat!(
            "name: root\n",
            "subcomponents:\n",
            "  - name: shared\n    method: local\n    source: ./shared\n",
            "  - name: shared\n    method: local\n    source: ./shared\n",
        ),
    )
    .unwrap();
    ws.write_component("shared", "name: lib\n").unwrap();

    let coordinator = Arc::new(CloneCoordinator::new());
    let report = ws.installer_with(Arc::clone(&coordinator)).unwrap().install(Path::new(".")).await.unwrap();

    assert_eq!(coordinator.fetch_count(), 1);
    assert_eq!(logical_paths(&report), ["root", "root/shared", "root/shared/lib"]);
}

#[tokio::test]
async fn test_hooks_run_around_the_fetch() {
    let ws = TestWorkspace::new().unwrap();
    ws.write_component(
        ".",
        concat!(
            "name: root\n",
            "subcomponents:\n",
            "  - name: shared\n",
            "    method: local\n",
            "    source: ./shared\n",
            "    hooks:\n",
            "      before-install:\n        - touch before.txt\n        - exit 7\n",
            "      after-install:\n        - test -f component.yaml && touch after.txt\n",
        ),
    )
    .unwrap();
    ws.write_component("shared", "name: lib\n").unwrap();

    ws.installer().unwrap().install(Path::new(".")).await.unwrap();

    // before-install runs where the component was declared, after-install in its content
    assert!(ws.path("before.txt").is_file());
    assert!(ws.path("_components/_local/shared/after.txt").is_file());
    assert!(!ws.path("shared/after.txt").exists());
}

#[tokio::test]
async fn test_missing_definition_in_fetched_tree() {
    let ws = TestWorkspace::new().unwrap();
    ws.write_component("infra", "name: root\nsubcomponents:\n  - name: empty\n    method: local\n    source: ./empty\n")
        .unwrap();
    ws.write_file("infra/empty/README.md", "nothing here\n").unwrap();

    let err = ws.installer().unwrap().install(Path::new("infra")).await.unwrap_err();
    assert!(matches!(err.downcast_ref::<FabError>(), Some(FabError::DefinitionNotFound { .. })));
}

#[tokio::test]
async fn test_local_source_outside_workspace_is_rejected() {
    let ws = TestWorkspace::new().unwrap();
    let outside = tempfile::TempDir::new().unwrap();
    ws.write_component(
        ".",
        &format!(
            "name: root\nsubcomponents:\n  - name: escape\n    method: local\n    source: {}\n",
            outside.path().display()
        ),
    )
    .unwrap();

    let err = ws.installer().unwrap().install(Path::new(".")).await.unwrap_err();
    assert!(matches!(err.downcast_ref::<FabError>(), Some(FabError::InvalidSource { .. })));
}

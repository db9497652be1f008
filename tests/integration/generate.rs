use fab_cli::core::FabError;
use std::path::Path;

use crate::common::TestWorkspace;

#[tokio::test]
async fn test_static_component_from_local_directory() {
    let ws = TestWorkspace::new().unwrap();
    ws.write_component(
        ".",
        concat!(
            "name: root\n",
            "subcomponents:\n",
            "  - name: site\n",
            "    subcomponents:\n",
            "      - name: manifests\n        type: static\n        method: local\n        source: ./fragments\n",
        ),
    )
    .unwrap();
    ws.write_file("fragments/a-namespace.yaml", "apiVersion: v1\nkind: Namespace\nmetadata:\n  name: site\n")
        .unwrap();
    ws.write_file("fragments/b-config.yaml", "apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: cfg\n")
        .unwrap();

    let installer = ws.installer().unwrap();
    installer.install(Path::new(".")).await.unwrap();
    let generated = installer.generate(Path::new(".")).await.unwrap();

    assert_eq!(generated.len(), 1);
    assert_eq!(generated[0].logical_path, "root/site/manifests");
    assert_eq!(generated[0].output, ws.path("_generated/root_site_manifests.yaml"));
    assert_eq!(
        ws.read("_generated/root_site_manifests.yaml").unwrap(),
        concat!(
            "apiVersion: v1\nkind: Namespace\nmetadata:\n  name: site\n",
            "\n---\n",
            "apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: cfg\n",
        )
    );
}

#[tokio::test]
async fn test_static_child_of_fetched_tree_and_parent_disable_overlay() {
    let ws = TestWorkspace::new().unwrap();
    ws.write_component(
        ".",
        concat!(
            "name: root\n",
            "config:\n  subcomponents:\n    legacy:\n      disabled: true\n",
            "subcomponents:\n",
            "  - name: bundle\n    method: local\n    source: ./bundle\n",
            "  - name: legacy\n    type: static\n    path: legacy\n",
        ),
    )
    .unwrap();
    ws.write_component("bundle", "name: crds\nsubcomponents:\n  - name: defs\n    type: static\n    path: manifests\n")
        .unwrap();
    ws.write_file("bundle/manifests/crd.yaml", "kind: CustomResourceDefinition\n").unwrap();
    ws.write_file("legacy/old.yaml", "kind: Old\n").unwrap();

    let installer = ws.installer().unwrap();
    installer.install(Path::new(".")).await.unwrap();
    let generated = installer.generate(Path::new(".")).await.unwrap();

    let outputs: Vec<_> = generated.iter().map(|g| g.logical_path.as_str()).collect();
    assert_eq!(outputs, ["root/bundle/crds/defs"]);
    assert_eq!(
        ws.read("_generated/root_bundle_crds_defs.yaml").unwrap(),
        "kind: CustomResourceDefinition\n"
    );
    assert!(!ws.path("_generated/root_legacy.yaml").exists());
}

#[tokio::test]
async fn test_sibling_file_roots_in_one_directory() {
    let ws = TestWorkspace::new().unwrap();
    ws.write_component(
        ".",
        concat!(
            "name: root\n",
            "subcomponents:\n",
            "  - name: a\n    type: static\n    method: local\n    source: ./files/a.yaml\n",
            "  - name: b\n    type: static\n    method: local\n    source: ./files/b.yaml\n",
        ),
    )
    .unwrap();
    ws.write_file("files/a.yaml", "kind: A\n").unwrap();
    ws.write_file("files/b.yaml", "kind: B\n").unwrap();

    let installer = ws.installer().unwrap();
    installer.install(Path::new(".")).await.unwrap();
    installer.generate(Path::new(".")).await.unwrap();

    assert_eq!(ws.read("_generated/root_a.yaml").unwrap(), "kind: A\n");
    assert_eq!(ws.read("_generated/root_b.yaml").unwrap(), "kind: B\n");
}

#[tokio::test]
async fn test_generate_hooks_are_fatal() {
    let ws = TestWorkspace::new().unwrap();
    ws.write_component(
        ".",
        concat!(
            "name: root\n",
            "subcomponents:\n",
            "  - name: web\n    type: static\n    path: web\n",
            "    hooks:\n      before-generate: [\"exit 2\"]\n",
        ),
    )
    .unwrap();
    ws.write_file("web/svc.yaml", "kind: Service\n").unwrap();

    let installer = ws.installer().unwrap();
    installer.install(Path::new(".")).await.unwrap();
    let err = installer.generate(Path::new(".")).await.unwrap_err();
    assert!(matches!(err.downcast_ref::<FabError>(), Some(FabError::HookFailed { hook, .. }) if hook == "before-generate"));
    assert!(!ws.path("_generated/root_web.yaml").exists());
}

#[tokio::test]
async fn test_generate_without_install() {
    let ws = TestWorkspace::new().unwrap();
    ws.write_component(".", "name: root\n").unwrap();
    let err = ws.installer().unwrap().generate(Path::new(".")).await.unwrap_err();
    assert!(format!("{err:#}").contains("fab install"));
}

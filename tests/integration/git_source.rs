use fab_cli::core::{ErrorCategory, error_category};
use fab_cli::lockfile::InstallReport;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

use crate::common::{TestGit, TestWorkspace};

/// A repository with two commits on `main` and a `feature` branch.
///
/// Returns the repo and the SHAs of the first and second commit on `main`.
fn fixture_repo(dir: &Path) -> (TestGit, String, String) {
    let git = TestGit::new(dir.join("stack"));
    git.init().unwrap();

    fs::create_dir_all(git.repo_path().join("deploy/manifests")).unwrap();
    fs::write(
        git.repo_path().join("deploy/component.yaml"),
        "name: stack\nsubcomponents:\n  - name: manifests\n    type: static\n    path: manifests\n",
    )
    .unwrap();
    fs::write(git.repo_path().join("deploy/manifests/app.yaml"), "kind: Deployment\n").unwrap();
    let first = git.commit_all("initial").unwrap();

    fs::write(git.repo_path().join("deploy/manifests/svc.yaml"), "kind: Service\n").unwrap();
    let second = git.commit_all("add service").unwrap();

    git.create_branch("feature").unwrap();
    fs::write(git.repo_path().join("FEATURE"), "on feature\n").unwrap();
    git.commit_all("feature work").unwrap();
    git.checkout("main").unwrap();

    (git, first, second)
}

fn git_component(url: &str, pin: &str) -> String {
    format!("name: root\nsubcomponents:\n  - name: stack\n    method: git\n    source: {url}\n    path: deploy\n{pin}")
}

#[tokio::test]
async fn test_pinned_sha_is_checked_out() {
    let repos = TempDir::new().unwrap();
    let (git, first, _) = fixture_repo(repos.path());
    let ws = TestWorkspace::new().unwrap();
    ws.write_component(".", &git_component(&git.url(), &format!("    version: {first}\n"))).unwrap();

    let installer = ws.installer().unwrap();
    let report = installer.install(Path::new(".")).await.unwrap();

    let physical = report.physical_path("root/stack").unwrap().to_path_buf();
    assert!(physical.ends_with(&first));
    let checkout = ws.root().join(&physical);
    assert!(checkout.join("deploy/manifests/app.yaml").is_file());
    assert!(!checkout.join("deploy/manifests/svc.yaml").exists());

    installer.generate(Path::new(".")).await.unwrap();
    assert_eq!(ws.read("_generated/root_stack_stack_manifests.yaml").unwrap(), "kind: Deployment\n");
}

#[tokio::test]
async fn test_branch_and_latest_destinations() {
    let repos = TempDir::new().unwrap();
    let (git, _, _) = fixture_repo(repos.path());
    let ws = TestWorkspace::new().unwrap();
    ws.write_component(
        ".",
        &format!(
            concat!(
                "name: root\n",
                "subcomponents:\n",
                "  - name: feature\n    method: git\n    source: {url}\n    branch: feature\n    path: deploy\n",
                "  - name: tip\n    method: git\n    source: {url}\n    path: deploy\n",
            ),
            url = git.url()
        ),
    )
    .unwrap();

    let report = ws.installer().unwrap().install(Path::new(".")).await.unwrap();

    let feature = ws.root().join(report.physical_path("root/feature").unwrap());
    assert!(feature.ends_with("feature"));
    assert!(feature.join("FEATURE").is_file());

    let tip = ws.root().join(report.physical_path("root/tip").unwrap());
    assert!(tip.ends_with("latest"));
    assert!(tip.join("deploy/manifests/svc.yaml").is_file());
    assert!(!tip.join("FEATURE").exists());

    // both remote trees are spliced under their declaring component
    let logical: Vec<_> = report.components.iter().map(|(l, _)| l.to_string()).collect();
    assert!(logical.contains(&"root/feature/stack/manifests".to_string()));
    assert!(logical.contains(&"root/tip/stack/manifests".to_string()));
}

#[tokio::test]
async fn test_unknown_sha_fails_as_fetch_error() {
    let repos = TempDir::new().unwrap();
    let (git, _, _) = fixture_repo(repos.path());
    let ws = TestWorkspace::new().unwrap();
    ws.write_component(
        ".",
        &git_component(&git.url(), "    version: 0123456789abcdef0123456789abcdef01234567\n"),
    )
    .unwrap();

    let err = ws.installer().unwrap().install(Path::new(".")).await.unwrap_err();
    assert_eq!(error_category(&err), Some(ErrorCategory::Fetch));
    assert!(!ws.path("_install.lock.json").exists());
}

#[tokio::test]
async fn test_sha_and_branch_together_are_rejected() {
    let ws = TestWorkspace::new().unwrap();
    ws.write_component(
        ".",
        &git_component("https://example.com/org/repo", "    version: abc\n    branch: main\n"),
    )
    .unwrap();

    let err = ws.installer().unwrap().install(Path::new(".")).await.unwrap_err();
    assert_eq!(error_category(&err), Some(ErrorCategory::Validation));
}

#[tokio::test]
async fn test_reinstall_refetches_into_same_destination() {
    let repos = TempDir::new().unwrap();
    let (git, _, second) = fixture_repo(repos.path());
    let ws = TestWorkspace::new().unwrap();
    ws.write_component(".", &git_component(&git.url(), &format!("    version: {second}\n"))).unwrap();

    let first_report = ws.installer().unwrap().install(Path::new(".")).await.unwrap();
    let checkout = ws.root().join(first_report.physical_path("root/stack").unwrap());
    fs::write(checkout.join("stray.txt"), "left behind").unwrap();

    ws.installer().unwrap().install(Path::new(".")).await.unwrap();
    assert!(!checkout.join("stray.txt").exists());
    assert_eq!(InstallReport::load(&ws.path("_install.lock.json")).unwrap(), first_report);
}

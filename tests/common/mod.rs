//! Common test utilities for fab integration tests.

// Not every helper is used by every test module
#![allow(dead_code)]

use anyhow::{Context, Result, bail};
use fab_cli::cache::CloneCoordinator;
use fab_cli::config::GlobalConfig;
use fab_cli::installer::Installer;
use fab_cli::workspace::Workspace;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;
use tempfile::TempDir;

/// Git command wrapper driving real local repositories.
pub struct TestGit {
    repo_path: PathBuf,
}

impl TestGit {
    pub fn new(repo_path: impl Into<PathBuf>) -> Self {
        Self {
            repo_path: repo_path.into(),
        }
    }

    fn run(&self, args: &[&str], action: &str) -> Result<String> {
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.repo_path)
            .output()
            .with_context(|| action.to_string())?;
        if !output.status.success() {
            bail!("{action} failed: {}", String::from_utf8_lossy(&output.stderr));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// `git init` with a fixed default branch and a test identity.
    pub fn init(&self) -> Result<()> {
        fs::create_dir_all(&self.repo_path)?;
        self.run(&["init"], "Failed to initialize git repository")?;
        self.run(&["symbolic-ref", "HEAD", "refs/heads/main"], "Failed to set default branch")?;
        self.run(&["config", "user.email", "test@fab.example"], "Failed to configure git user email")?;
        self.run(&["config", "user.name", "Test User"], "Failed to configure git user name")?;
        self.run(&["config", "commit.gpgsign", "false"], "Failed to disable commit signing")?;
        Ok(())
    }

    /// Stage everything and commit, returning the new HEAD SHA.
    pub fn commit_all(&self, message: &str) -> Result<String> {
        self.run(&["add", "."], "Failed to add files to git")?;
        self.run(&["commit", "-m", message], "Failed to create git commit")?;
        self.head_sha()
    }

    pub fn create_branch(&self, branch: &str) -> Result<()> {
        self.run(&["checkout", "-b", branch], &format!("Failed to create branch {branch}"))?;
        Ok(())
    }

    pub fn checkout(&self, reference: &str) -> Result<()> {
        self.run(&["checkout", reference], &format!("Failed to checkout {reference}"))?;
        Ok(())
    }

    pub fn head_sha(&self) -> Result<String> {
        self.run(&["rev-parse", "HEAD"], "Failed to read HEAD")
    }

    /// `file://` URL of the repository.
    pub fn url(&self) -> String {
        format!("file://{}", self.repo_path.display())
    }

    pub fn repo_path(&self) -> &Path {
        &self.repo_path
    }
}

/// A temporary workspace with helpers for writing component trees.
pub struct TestWorkspace {
    pub temp: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Result<Self> {
        fab_cli::test_utils::init_test_logging(None);
        Ok(Self {
            temp: TempDir::new()?,
        })
    }

    pub fn root(&self) -> &Path {
        self.temp.path()
    }

    pub fn path(&self, relative: &str) -> PathBuf {
        self.temp.path().join(relative)
    }

    /// Write `component.yaml` into `dir` (relative to the root).
    pub fn write_component(&self, dir: &str, definition: &str) -> Result<()> {
        self.write_file(&format!("{dir}/component.yaml"), definition)
    }

    pub fn write_file(&self, relative: &str, content: &str) -> Result<()> {
        let path = self.path(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, content).with_context(|| format!("Failed to write {}", path.display()))
    }

    pub fn read(&self, relative: &str) -> Result<String> {
        let path = self.path(relative);
        fs::read_to_string(&path).with_context(|| format!("Failed to read {}", path.display()))
    }

    /// An installer over this workspace with ssh-agent loading disabled.
    pub fn installer(&self) -> Result<Installer> {
        self.installer_with(Arc::new(CloneCoordinator::new()))
    }

    pub fn installer_with(&self, coordinator: Arc<CloneCoordinator>) -> Result<Installer> {
        let config = GlobalConfig {
            ssh_agent: false,
            ..GlobalConfig::default()
        };
        Installer::new(Workspace::new(self.root()), coordinator, config)
    }
}

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;

use super::{FetchContext, Installable, check_coordinate};
use crate::constants::LATEST_VERSION;
use crate::core::FabError;
use crate::git::{GitRepo, redact_url, uses_ssh};
use crate::locator::locator_to_path;
use crate::utils::fs::{ensure_dir, remove_path};

/// A git repository, optionally pinned to a commit or a branch.
#[derive(Debug, Clone)]
pub struct GitSource {
    url: String,
    sha: Option<String>,
    branch: Option<String>,
    ctx: Arc<FetchContext>,
}

impl GitSource {
    pub fn new(
        url: impl Into<String>,
        sha: Option<String>,
        branch: Option<String>,
        ctx: Arc<FetchContext>,
    ) -> Self {
        Self {
            url: url.into(),
            sha: sha.filter(|s| !s.is_empty()),
            branch: branch.filter(|b| !b.is_empty()),
            ctx,
        }
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    fn invalid(&self, reason: impl Into<String>) -> anyhow::Error {
        FabError::InvalidSource {
            component: redact_url(&self.url),
            reason: reason.into(),
        }
        .into()
    }
}

impl Installable for GitSource {
    fn validate(&self) -> Result<()> {
        if self.url.trim().is_empty() {
            return Err(self.invalid("git url must not be empty"));
        }
        if let (Some(sha), Some(branch)) = (&self.sha, &self.branch) {
            return Err(self.invalid(format!(
                "only one of sha or branch can be provided, got '{sha}' and '{branch}'"
            )));
        }
        let shown = redact_url(&self.url);
        if let Some(sha) = &self.sha {
            check_coordinate(sha, "sha", &shown)?;
        }
        if let Some(branch) = &self.branch {
            check_coordinate(branch, "branch", &shown)?;
        }
        Ok(())
    }

    fn install_path(&self) -> Result<PathBuf> {
        self.validate()?;
        let version = self.sha.as_deref().or(self.branch.as_deref()).unwrap_or(LATEST_VERSION);
        self.ctx.destination(&locator_to_path(&self.url)?.join(version))
    }

    async fn install(&self) -> Result<()> {
        let dest = self.install_path()?;
        let shown = redact_url(&self.url);
        remove_path(&dest)?;
        if let Some(parent) = dest.parent() {
            ensure_dir(parent)?;
        }

        if let Some(agent) = self.ctx.ssh_agent().filter(|_| uses_ssh(&self.url)) {
            if let Err(e) = agent.ensure_identities().await {
                tracing::warn!(target: "git", "Continuing without loading ssh identities: {e:#}");
            }
        }

        let clone_url = self.ctx.tokens().authenticated_url(&self.url);
        let repo = GitRepo::clone(&clone_url, &dest, self.branch.as_deref(), self.ctx.git_timeout())
            .await
            .with_context(|| format!("Failed to clone {shown} into {}", dest.display()))?;

        if let Some(sha) = &self.sha {
            repo.checkout(sha, self.ctx.git_timeout()).await?;
            repo.verify_commit(sha).await?;
        } else if let Some(branch) = &self.branch {
            repo.verify_branch(branch).await?;
        }

        tracing::debug!(target: "git", "Cloned {shown} into {}", dest.display());
        Ok(())
    }
}

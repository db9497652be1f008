//! Source backends: materializing one kind of external resource on disk.
//!
//! Each backend knows how to validate its coordinates, compute a deterministic
//! destination under `_components/`, fetch into it, and clean it. The
//! installer never calls a backend directly; every fetch is routed through
//! [`crate::cache::CloneCoordinator`] keyed by [`Installable::lock_path`].
//!
//! | Backend        | Destination                                          |
//! |----------------|------------------------------------------------------|
//! | [`GitSource`]  | `_components/<codec(url)>/<sha\|branch\|latest>`     |
//! | [`HelmSource`] | `_components/<codec(url)>/<chart>/<version\|latest>` |
//! | [`LocalSource`]| `_components/_local/<path relative to the workspace>`|
//! | [`HttpSource`] | `_components/<codec(url)>` (a file)                  |
//!
//! Fetching is not incremental: every install clears the destination first.

mod git;
mod helm;
mod http;
mod local;

pub use git::GitSource;
pub use helm::HelmSource;
pub use http::{HttpSource, validate_yaml_body};
pub use local::LocalSource;

use anyhow::{Context, Result};
use std::future::Future;
use std::path::{Component as PathComponent, Path, PathBuf};
use std::time::Duration;

use crate::config::{AccessTokens, GlobalConfig};
use crate::constants::DEFAULT_HTTP_TIMEOUT;
use crate::core::FabError;
use crate::ssh::SshAgent;
use crate::utils::fs::remove_path;
use crate::workspace::Workspace;

/// A fetchable resource.
pub trait Installable {
    /// Stateless field checks.
    fn validate(&self) -> Result<()>;

    /// Where [`Installable::install`] puts the resource. Pure given valid fields.
    fn install_path(&self) -> Result<PathBuf>;

    /// Fetch the resource into [`Installable::install_path`], replacing any
    /// previous content.
    fn install(&self) -> impl Future<Output = Result<()>> + Send;

    /// Remove everything at [`Installable::install_path`].
    fn clean(&self) -> Result<()> {
        let path = self.install_path()?;
        remove_path(&path).with_context(|| format!("Failed to clean {}", path.display()))
    }

    /// Key the fetch is coordinated under: the exact path the fetch writes.
    fn lock_path(&self) -> Result<PathBuf> {
        self.install_path()
    }
}

/// Shared state every backend fetches with.
#[derive(Debug)]
pub struct FetchContext {
    install_root: PathBuf,
    boundary: PathBuf,
    tokens: AccessTokens,
    ssh_agent: Option<SshAgent>,
    git_timeout: Duration,
    helm_timeout: Duration,
    http: reqwest::Client,
}

impl FetchContext {
    /// Build the context for a run in `workspace`.
    ///
    /// # Errors
    ///
    /// Fails when the HTTP client cannot be initialized.
    pub fn new(workspace: &Workspace, config: &GlobalConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("fab/", env!("CARGO_PKG_VERSION")))
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            install_root: workspace.install_dir(),
            boundary: workspace.root().to_path_buf(),
            tokens: config.access_tokens(),
            ssh_agent: config.ssh_agent.then(SshAgent::new),
            git_timeout: config.git_timeout(),
            helm_timeout: config.helm_timeout(),
            http,
        })
    }

    /// `_components/` of the workspace.
    #[must_use]
    pub fn install_root(&self) -> &Path {
        &self.install_root
    }

    /// `relative` joined under the install root.
    ///
    /// # Errors
    ///
    /// Returns [`FabError::InvalidSource`] unless `relative` is made only of
    /// plain segments, so nothing outside `_components/` is ever written or
    /// cleaned.
    pub fn destination(&self, relative: &Path) -> Result<PathBuf> {
        if !is_plain_relative(relative) {
            return Err(FabError::InvalidSource {
                component: relative.display().to_string(),
                reason: format!("destination must stay inside {}", self.install_root.display()),
            }
            .into());
        }
        Ok(self.install_root.join(relative))
    }

    /// Directory local sources must stay inside.
    #[must_use]
    pub fn boundary(&self) -> &Path {
        &self.boundary
    }

    #[must_use]
    pub const fn tokens(&self) -> &AccessTokens {
        &self.tokens
    }

    #[must_use]
    pub const fn ssh_agent(&self) -> Option<&SshAgent> {
        self.ssh_agent.as_ref()
    }

    #[must_use]
    pub const fn git_timeout(&self) -> Duration {
        self.git_timeout
    }

    #[must_use]
    pub const fn helm_timeout(&self) -> Duration {
        self.helm_timeout
    }

    #[must_use]
    pub const fn http(&self) -> &reqwest::Client {
        &self.http
    }
}

/// Whether `path` is non-empty and made only of normal segments (no `.`,
/// `..`, root or prefix).
pub(crate) fn is_plain_relative(path: &Path) -> bool {
    let mut components = path.components().peekable();
    components.peek().is_some() && components.all(|c| matches!(c, PathComponent::Normal(_)))
}

/// Reject a version, branch or chart name that would not be a plain
/// directory name under the install root.
pub(crate) fn check_coordinate(value: &str, what: &str, component: &str) -> Result<()> {
    if is_plain_relative(Path::new(value)) {
        return Ok(());
    }
    Err(FabError::InvalidSource {
        component: component.to_string(),
        reason: format!("{what} '{value}' is not a valid path segment"),
    }
    .into())
}

/// The closed set of fetch backends, selected from a component's method.
#[derive(Debug, Clone)]
pub enum Source {
    Git(GitSource),
    Helm(HelmSource),
    Local(LocalSource),
    Http(HttpSource),
}

impl Source {
    /// Short human readable description used in log lines.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Git(git) => format!("git {}", crate::git::redact_url(git.url())),
            Self::Helm(helm) => format!("helm chart {} from {}", helm.chart(), helm.url()),
            Self::Local(local) => format!("local {}", local.root().display()),
            Self::Http(http) => format!("http {}", http.url()),
        }
    }
}

impl Installable for Source {
    fn validate(&self) -> Result<()> {
        match self {
            Self::Git(source) => source.validate(),
            Self::Helm(source) => source.validate(),
            Self::Local(source) => source.validate(),
            Self::Http(source) => source.validate(),
        }
    }

    fn install_path(&self) -> Result<PathBuf> {
        match self {
            Self::Git(source) => source.install_path(),
            Self::Helm(source) => source.install_path(),
            Self::Local(source) => source.install_path(),
            Self::Http(source) => source.install_path(),
        }
    }

    async fn install(&self) -> Result<()> {
        match self {
            Self::Git(source) => source.install().await,
            Self::Helm(source) => source.install().await,
            Self::Local(source) => source.install().await,
            Self::Http(source) => source.install().await,
        }
    }

    fn clean(&self) -> Result<()> {
        match self {
            Self::Git(source) => source.clean(),
            Self::Helm(source) => source.clean(),
            Self::Local(source) => source.clean(),
            Self::Http(source) => source.clean(),
        }
    }

    fn lock_path(&self) -> Result<PathBuf> {
        match self {
            Self::Git(source) => source.lock_path(),
            Self::Helm(source) => source.lock_path(),
            Self::Local(source) => source.lock_path(),
            Self::Http(source) => source.lock_path(),
        }
    }
}

#[cfg(test)]
pub(crate) fn test_context(root: &Path) -> std::sync::Arc<FetchContext> {
    let config = GlobalConfig {
        ssh_agent: false,
        ..GlobalConfig::default()
    };
    std::sync::Arc::new(FetchContext::new(&Workspace::new(root), &config).unwrap())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ErrorCategory;
    use tempfile::TempDir;

    #[test]
    fn test_is_plain_relative() {
        assert!(is_plain_relative(Path::new("github.com/org/repo/main")));
        assert!(is_plain_relative(Path::new("feature/login")));
        assert!(!is_plain_relative(Path::new("")));
        assert!(!is_plain_relative(Path::new("..")));
        assert!(!is_plain_relative(Path::new("a/../../b")));
        assert!(!is_plain_relative(Path::new("./a")));
        assert!(!is_plain_relative(Path::new("/etc")));
    }

    #[test]
    fn test_destination_stays_inside_install_root() {
        let temp = TempDir::new().unwrap();
        let ctx = test_context(temp.path());
        assert_eq!(
            ctx.destination(Path::new("example.com/a")).unwrap(),
            temp.path().join("_components").join("example.com").join("a")
        );

        let err = ctx.destination(Path::new("example.com/../../keep")).unwrap_err();
        let fab = err.downcast_ref::<FabError>().unwrap();
        assert!(matches!(fab, FabError::InvalidSource { .. }));
        assert_eq!(fab.category(), ErrorCategory::Validation);
    }
}

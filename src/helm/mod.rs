//! Wrapper around the system `helm` binary.
//!
//! fab uses helm for two things: pulling charts out of chart repositories
//! ([`pull`]) and rendering them ([`template`]). Both go through
//! [`HelmCommand`], which applies a timeout, kills the child when the calling
//! future is dropped, and maps failures to [`FabError::HelmCommandError`].
//!
//! `helm template` is held to a stricter standard than other sub-commands:
//! any output on stderr is a failure even when the exit status is zero, since
//! helm reports missing values and deprecated APIs there while still printing
//! a (wrong) manifest.

use anyhow::{Context, Result};
use regex::Regex;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

use crate::constants::DEFAULT_HELM_TIMEOUT;
use crate::core::FabError;
use crate::manifest::{Value, decode_documents};

/// Builder for a single `helm` invocation.
pub struct HelmCommand {
    args: Vec<String>,
    timeout_duration: Duration,
    strict_stderr: bool,
}

impl HelmCommand {
    pub fn new() -> Self {
        Self {
            args: Vec::new(),
            timeout_duration: DEFAULT_HELM_TIMEOUT,
            strict_stderr: false,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub const fn with_timeout(mut self, duration: Duration) -> Self {
        self.timeout_duration = duration;
        self
    }

    /// Treat any stderr output as failure.
    pub const fn strict_stderr(mut self) -> Self {
        self.strict_stderr = true;
        self
    }

    /// Run helm and return stdout.
    ///
    /// # Errors
    ///
    /// - [`FabError::ToolNotFound`] when helm is not installed
    /// - [`FabError::HelmCommandError`] on timeout, non-zero exit, or (when
    ///   strict) any stderr output
    pub async fn execute(self) -> Result<String> {
        let operation = self.args.first().cloned().unwrap_or_else(|| "unknown".to_string());
        let shown = self.args.join(" ");
        tracing::debug!(target: "helm", "Executing command: helm {shown}");

        let helm = which::which("helm").map_err(|_| FabError::ToolNotFound {
            tool: "helm".to_string(),
        })?;
        let mut cmd = Command::new(helm);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let Ok(output) = tokio::time::timeout(self.timeout_duration, cmd.output()).await else {
            tracing::warn!(
                target: "helm",
                "Command timed out after {} seconds: helm {shown}",
                self.timeout_duration.as_secs()
            );
            return Err(FabError::HelmCommandError {
                operation,
                stderr: format!("timed out after {} seconds", self.timeout_duration.as_secs()),
            }
            .into());
        };
        let output = output.with_context(|| format!("Failed to execute helm {shown}"))?;

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        if !output.status.success() {
            tracing::debug!(
                target: "helm",
                "Command failed with exit code {:?}: {}",
                output.status.code(),
                stderr.trim()
            );
            return Err(FabError::HelmCommandError {
                operation,
                stderr: stderr.trim().to_string(),
            }
            .into());
        }
        if !stderr.trim().is_empty() {
            if self.strict_stderr {
                return Err(FabError::HelmCommandError {
                    operation,
                    stderr: format!("exited with output to stderr: {}", stderr.trim()),
                }
                .into());
            }
            tracing::debug!(target: "helm", "{}", stderr.trim());
        }

        Ok(stdout)
    }
}

impl Default for HelmCommand {
    fn default() -> Self {
        Self::new()
    }
}

/// Options for `helm template`.
///
/// ```text
/// helm template [--repo R] [--version V] [--create-namespace --namespace N]
///               [--set k=v]... [--values f]... [RELEASE] CHART
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateOptions {
    pub release: Option<String>,
    /// Chart reference: a local directory, or a chart name when `repo` is set
    pub chart: String,
    pub repo: Option<String>,
    pub version: Option<String>,
    pub namespace: Option<String>,
    pub set: Vec<String>,
    pub values: Vec<PathBuf>,
}

impl TemplateOptions {
    #[must_use]
    pub fn args(&self) -> Vec<String> {
        let mut args = vec!["template".to_string()];
        if let Some(repo) = &self.repo {
            args.extend(["--repo".to_string(), repo.clone()]);
        }
        if let Some(version) = &self.version {
            args.extend(["--version".to_string(), version.clone()]);
        }
        if let Some(namespace) = &self.namespace {
            args.extend([
                "--create-namespace".to_string(),
                "--namespace".to_string(),
                namespace.clone(),
            ]);
        }
        for set in &self.set {
            args.extend(["--set".to_string(), set.clone()]);
        }
        for values in &self.values {
            args.extend(["--values".to_string(), values.display().to_string()]);
        }
        if let Some(release) = &self.release {
            args.push(release.clone());
        }
        args.push(self.chart.clone());
        args
    }
}

/// Run `helm template` and decode its output.
///
/// Empty documents are kept as [`Value::Null`]; the merge step drops them.
pub async fn template(options: &TemplateOptions, timeout: Duration) -> Result<Vec<Value>> {
    let stdout = HelmCommand::new()
        .args(options.args())
        .with_timeout(timeout)
        .strict_stderr()
        .execute()
        .await
        .with_context(|| format!("Failed to template helm chart {}", options.chart))?;

    decode_documents(stdout.as_bytes()).context("Failed to parse output of 'helm template'")
}

/// `helm pull` a chart into `untar_dir`, returning the extracted chart directory.
///
/// A repository already configured on the helm client under a name is reused
/// (`helm pull <name>/<chart>`); otherwise the chart is pulled with `--repo`.
pub async fn pull(
    repo: &str,
    chart: &str,
    version: Option<&str>,
    untar_dir: &Path,
    timeout: Duration,
) -> Result<PathBuf> {
    let mut cmd = HelmCommand::new().arg("pull").with_timeout(timeout);
    match find_repo_name_by_url(repo, timeout).await? {
        Some(name) => {
            tracing::debug!(target: "helm", "Using configured repository '{name}' for {repo}");
            cmd = cmd.arg(format!("{name}/{chart}"));
        }
        None => cmd = cmd.args([chart, "--repo", repo]),
    }
    if let Some(version) = version {
        cmd = cmd.args(["--version", version]);
    }
    cmd.args(["--untar", "--untardir"])
        .arg(untar_dir.display().to_string())
        .execute()
        .await
        .with_context(|| format!("Failed to pull helm chart {chart} from {repo}"))?;

    Ok(untar_dir.join(chart))
}

#[derive(Debug, Deserialize)]
struct RepoEntry {
    name: String,
    url: String,
}

/// Name of a configured helm repository whose URL equals `url`.
pub async fn find_repo_name_by_url(url: &str, timeout: Duration) -> Result<Option<String>> {
    let output =
        match HelmCommand::new().args(["repo", "list", "-o", "json"]).with_timeout(timeout).execute().await
        {
            Ok(output) => output,
            // helm exits non-zero when no repositories are configured
            Err(e)
                if matches!(
                    e.downcast_ref::<FabError>(),
                    Some(FabError::HelmCommandError { stderr, .. }) if stderr.contains("no repositories")
                ) =>
            {
                return Ok(None);
            }
            Err(e) => return Err(e),
        };
    repo_name_from_list(&output, url)
}

fn repo_name_from_list(json: &str, url: &str) -> Result<Option<String>> {
    if json.trim().is_empty() {
        return Ok(None);
    }
    let entries: Vec<RepoEntry> =
        serde_json::from_str(json).context("Failed to parse output of 'helm repo list'")?;
    let wanted = url.trim_end_matches('/');
    Ok(entries.into_iter().find(|entry| entry.url.trim_end_matches('/') == wanted).map(|e| e.name))
}

/// Parsed `helm version` output.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildInfo {
    pub version: String,
    pub git_commit: String,
    pub git_tree_state: String,
    pub go_version: String,
}

impl BuildInfo {
    /// Parse the `version.BuildInfo{...}` line printed by `helm version`.
    ///
    /// # Errors
    ///
    /// Returns [`FabError::UnsupportedHelmVersion`] when the output has no
    /// recognisable build info.
    pub fn parse(output: &str) -> Result<Self> {
        let re = Regex::new(
            r#"(?i)Version:"(?P<version>v\d+\.\d+\.\d+[^"]*)".*GitCommit:"(?P<commit>[^"]*)".*GitTreeState:"(?P<tree>[^"]*)".*GoVersion:"(?P<go>[^"]*)""#,
        )?;
        let caps = re.captures(output).ok_or_else(|| FabError::UnsupportedHelmVersion {
            version: output.trim().to_string(),
        })?;
        Ok(Self {
            version: caps["version"].to_string(),
            git_commit: caps["commit"].to_string(),
            git_tree_state: caps["tree"].to_string(),
            go_version: caps["go"].to_string(),
        })
    }

    /// `(major, minor, patch)` of [`Self::version`].
    #[must_use]
    pub fn semver(&self) -> Option<(u64, u64, u64)> {
        let mut parts = self.version.trim_start_matches(['v', 'V']).splitn(3, '.');
        let major = parts.next()?.parse().ok()?;
        let minor = parts.next()?.parse().ok()?;
        let patch = parts.next()?.split(|c: char| !c.is_ascii_digit()).next()?.parse().ok()?;
        Some((major, minor, patch))
    }

    #[must_use]
    pub fn is_helm3(&self) -> bool {
        self.version.to_lowercase().starts_with("v3.")
    }

    #[must_use]
    pub fn is_helm2(&self) -> bool {
        self.version.to_lowercase().starts_with("v2.")
    }
}

/// Run `helm version` and reject helm releases older than 3.
///
/// Helm 2 renders `crds/` through the templates and needs a cluster-side
/// component, so its output cannot be merged the way fab merges charts.
pub async fn ensure_supported_version(timeout: Duration) -> Result<BuildInfo> {
    let output = HelmCommand::new().arg("version").with_timeout(timeout).strict_stderr().execute().await?;
    let info = BuildInfo::parse(&output)?;
    match info.semver() {
        Some((major, ..)) if major >= 3 => Ok(info),
        _ => Err(FabError::UnsupportedHelmVersion {
            version: info.version,
        }
        .into()),
    }
}

//! Type-safe Git command builder for consistent command execution
//!
//! Every git invocation fab makes goes through [`GitCommand`], so timeouts,
//! logging and error mapping behave the same for clone, checkout and the
//! HEAD inspection commands.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;

use super::redact_url;
use crate::constants::DEFAULT_GIT_TIMEOUT;
use crate::core::FabError;

/// Builder for a single `git` invocation.
///
/// # Examples
///
/// ```rust,no_run
/// use fab_cli::git::command_builder::GitCommand;
///
/// # async fn example() -> anyhow::Result<()> {
/// let head = GitCommand::rev_parse("HEAD")
///     .current_dir("/path/to/repo")
///     .with_context("root/app")
///     .execute_stdout()
///     .await?;
/// # Ok(())
/// # }
/// ```
///
/// New commands default to a 5 minute timeout, captured output and the
/// process working directory.
pub struct GitCommand {
    /// Arguments passed to git (e.g. ["clone", "url", "path"])
    args: Vec<String>,

    /// Working directory, passed as `-C <dir>`
    current_dir: Option<PathBuf>,

    /// Extra environment variables for the git process
    env_vars: Vec<(String, String)>,

    /// Maximum duration to wait for completion (None = no timeout)
    timeout_duration: Option<Duration>,

    /// Identifier included in log lines (typically a logical path)
    context: Option<String>,

    /// For clone commands, the URL reported in errors (credentials removed)
    clone_url: Option<String>,
}

impl Default for GitCommand {
    fn default() -> Self {
        Self {
            args: Vec::new(),
            current_dir: None,
            env_vars: vec![
                // never block on an interactive credential prompt
                ("GIT_TERMINAL_PROMPT".to_string(), "0".to_string()),
            ],
            timeout_duration: Some(DEFAULT_GIT_TIMEOUT),
            context: None,
            clone_url: None,
        }
    }
}

impl GitCommand {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run the command against a repository directory (`git -C <dir>`).
    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.current_dir = Some(dir.as_ref().to_path_buf());
        self
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

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env_vars.push((key.into(), value.into()));
        self
    }

    /// Set a custom timeout for the command (None for no timeout)
    pub const fn with_timeout(mut self, duration: Option<Duration>) -> Self {
        self.timeout_duration = duration;
        self
    }

    /// Set an identifier for log lines, e.g. the component being fetched.
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Execute the command and return its output.
    ///
    /// # Errors
    ///
    /// - [`FabError::GitCommandError`] on timeout or a failing sub-command
    /// - [`FabError::GitCloneFailed`] / [`FabError::GitCheckoutFailed`] when a
    ///   clone or checkout exits unsuccessfully
    pub async fn execute(self) -> Result<GitCommandOutput> {
        let mut full_args = Vec::new();
        if let Some(ref dir) = self.current_dir {
            full_args.push("-C".to_string());
            full_args.push(dir.display().to_string());
        }
        let operation_index = full_args.len();
        full_args.extend(self.args.iter().cloned());

        let shown = full_args.iter().map(|arg| redact_url(arg)).collect::<Vec<_>>().join(" ");
        let prefix = self.context.as_deref().map(|ctx| format!("({ctx}) ")).unwrap_or_default();
        tracing::debug!(target: "git", "{prefix}Executing command: git {shown}");

        let mut cmd = Command::new("git");
        cmd.args(&full_args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        for (key, value) in &self.env_vars {
            cmd.env(key, value);
        }

        let operation =
            full_args.get(operation_index).cloned().unwrap_or_else(|| "unknown".to_string());
        let output_future = cmd.output();
        let output = if let Some(duration) = self.timeout_duration {
            if let Ok(result) = timeout(duration, output_future).await {
                result.with_context(|| format!("Failed to execute git {shown}"))?
            } else {
                tracing::warn!(
                    target: "git",
                    "{prefix}Command timed out after {} seconds: git {shown}",
                    duration.as_secs()
                );
                return Err(FabError::GitCommandError {
                    operation,
                    stderr: format!(
                        "Git command timed out after {} seconds. Try running it manually: git {shown}",
                        duration.as_secs()
                    ),
                }
                .into());
            }
        } else {
            output_future.await.with_context(|| format!("Failed to execute git {shown}"))?
        };

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        if !output.status.success() {
            tracing::debug!(
                target: "git",
                "{prefix}Command failed with exit code {:?}: {}",
                output.status.code(),
                stderr.trim()
            );

            let reason = if stderr.trim().is_empty() { stdout } else { stderr };
            let reason = redact_url(reason.trim());
            let error = match operation.as_str() {
                "clone" => FabError::GitCloneFailed {
                    url: self.clone_url.unwrap_or_else(|| "unknown".to_string()),
                    reason,
                },
                "checkout" => FabError::GitCheckoutFailed {
                    reference: full_args.get(operation_index + 1).cloned().unwrap_or_default(),
                    reason,
                },
                _ => FabError::GitCommandError {
                    operation,
                    stderr: reason,
                },
            };
            return Err(error.into());
        }

        if !stdout.trim().is_empty() {
            tracing::trace!(target: "git", "{prefix}{}", stdout.trim());
        }

        Ok(GitCommandOutput {
            stdout,
            stderr,
        })
    }

    /// Execute the command and return only stdout as a trimmed string
    pub async fn execute_stdout(self) -> Result<String> {
        let output = self.execute().await?;
        Ok(output.stdout.trim().to_string())
    }

    /// Execute the command and check for success
    pub async fn execute_success(self) -> Result<()> {
        self.execute().await?;
        Ok(())
    }
}

/// Output from a Git command
#[derive(Debug)]
pub struct GitCommandOutput {
    pub stdout: String,
    pub stderr: String,
}

// Convenience builders for the operations fab performs

impl GitCommand {
    /// `git clone [--branch B --single-branch --depth 1] URL TARGET`
    pub fn clone(url: &str, target: impl AsRef<Path>, branch: Option<&str>) -> Self {
        let mut cmd = Self::new().arg("clone");
        if let Some(branch) = branch {
            cmd = cmd.args(["--branch", branch, "--single-branch", "--depth", "1"]);
        }
        cmd = cmd.arg(url).arg(target.as_ref().display().to_string());
        cmd.clone_url = Some(redact_url(url));
        cmd
    }

    /// `git checkout <reference>`
    pub fn checkout(reference: &str) -> Self {
        Self::new().args(["checkout", reference])
    }

    /// `git rev-parse <reference>`
    pub fn rev_parse(reference: &str) -> Self {
        Self::new().args(["rev-parse", reference])
    }

    /// `git symbolic-ref HEAD`
    pub fn symbolic_head() -> Self {
        Self::new().args(["symbolic-ref", "HEAD"])
    }
}

//! Lifecycle hooks: shell commands run around install and generate.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

use crate::core::FabError;

/// Points in a component's lifecycle that can run commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookKind {
    BeforeInstall,
    AfterInstall,
    BeforeGenerate,
    AfterGenerate,
}

impl HookKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::BeforeInstall => "before-install",
            Self::AfterInstall => "after-install",
            Self::BeforeGenerate => "before-generate",
            Self::AfterGenerate => "after-generate",
        }
    }
}

impl fmt::Display for HookKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The `hooks` block of a component definition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Hooks {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub before_install: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub after_install: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub before_generate: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub after_generate: Vec<String>,
}

impl Hooks {
    #[must_use]
    pub fn commands(&self, kind: HookKind) -> &[String] {
        match kind {
            HookKind::BeforeInstall => &self.before_install,
            HookKind::AfterInstall => &self.after_install,
            HookKind::BeforeGenerate => &self.before_generate,
            HookKind::AfterGenerate => &self.after_generate,
        }
    }
}

/// Run `commands` in order with `sh -c` inside `dir`, stopping at the first failure.
///
/// Empty commands are skipped.
///
/// # Errors
///
/// Returns [`FabError::HookFailed`] naming the hook and command that failed.
pub async fn run_commands(kind: HookKind, commands: &[String], dir: &Path, component: &str) -> Result<()> {
    for command in commands.iter().filter(|c| !c.trim().is_empty()) {
        tracing::debug!(target: "fab::hooks", "({component}) {kind}: {command}");

        let output = Command::new("sh")
            .arg("-c")
            .arg(command)
            .current_dir(dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .with_context(|| format!("Failed to spawn {kind} hook `{command}` in {}", dir.display()))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        for line in stdout.lines() {
            tracing::info!(target: "fab::hooks", "({component}) {line}");
        }

        if !output.status.success() {
            return Err(FabError::HookFailed {
                hook: kind.to_string(),
                command: command.clone(),
                reason: format!(
                    "exited with {}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            }
            .into());
        }
    }
    Ok(())
}

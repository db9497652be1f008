//! Loading SSH identities into the process's agent before cloning over SSH.

use anyhow::{Context, Result};
use regex::Regex;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::sync::OnceCell;

use crate::core::FabError;

const SSH_ADD_TIMEOUT: Duration = Duration::from_secs(30);

/// One line of `ssh-add` output: `Identity added: <path> (<comment>)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub path: String,
    pub comment: String,
}

/// Parse the identities reported by `ssh-add`.
pub fn parse_identities(output: &str) -> Result<Vec<Identity>> {
    let re = Regex::new(r"(?i)Identity added: (?P<path>\S+) \((?P<comment>\S+)\)")?;
    Ok(output
        .lines()
        .filter_map(|line| re.captures(line))
        .map(|caps| Identity {
            path: caps["path"].to_string(),
            comment: caps["comment"].to_string(),
        })
        .collect())
}

/// Runs `ssh-add` at most once per agent and remembers the outcome.
#[derive(Debug, Default)]
pub struct SshAgent {
    outcome: OnceCell<std::result::Result<Vec<Identity>, String>>,
}

impl SshAgent {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the default identities, running `ssh-add` on first call only.
    ///
    /// # Errors
    ///
    /// Returns [`FabError::SshAgentError`] when `ssh-add` failed; later calls
    /// report the same failure without running it again.
    pub async fn ensure_identities(&self) -> Result<&[Identity]> {
        let outcome = self
            .outcome
            .get_or_init(|| async { run_ssh_add().await.map_err(|e| format!("{e:#}")) })
            .await;
        match outcome {
            Ok(identities) => Ok(identities),
            Err(reason) => Err(FabError::SshAgentError {
                reason: reason.clone(),
            }
            .into()),
        }
    }
}

async fn run_ssh_add() -> Result<Vec<Identity>> {
    let mut cmd = Command::new("ssh-add");
    cmd.stdin(Stdio::null()).stdout(Stdio::piped()).stderr(Stdio::piped()).kill_on_drop(true);
    tracing::debug!("Executing command: ssh-add");

    let output = tokio::time::timeout(SSH_ADD_TIMEOUT, cmd.output())
        .await
        .map_err(|_| anyhow::anyhow!("ssh-add timed out after {}s", SSH_ADD_TIMEOUT.as_secs()))?
        .context("Failed to execute ssh-add")?;

    // ssh-add reports on stderr
    let combined = format!(
        "{}{}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
    if !output.status.success() {
        return Err(anyhow::anyhow!("ssh-add exited with {}: {}", output.status, combined.trim()));
    }

    let identities = parse_identities(&combined)?;
    tracing::debug!("Loaded {} ssh identities", identities.len());
    Ok(identities)
}

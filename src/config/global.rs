//! Global configuration management for fab.
//!
//! The global configuration file (`~/.fab/config.toml`) holds user-wide settings
//! that must never live in a component tree: access tokens for private git
//! repositories, and timeouts for the external tools fab drives.
//!
//! # Configuration File Location
//!
//! - **Unix/macOS**: `~/.fab/config.toml`
//! - **Windows**: `%LOCALAPPDATA%\fab\config.toml`
//!
//! The location can be overridden with the `FAB_CONFIG` environment variable or
//! the `--config` command line flag.
//!
//! # File Format
//!
//! ```toml
//! git_timeout_secs = 600
//! helm_timeout_secs = 120
//! ssh_agent = false
//!
//! [access_tokens]
//! "https://github.com/company" = "ghp_xxxxxxxxxxxx"
//! ```
//!
//! A missing file is not an error; every field has a default.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

use super::tokens::AccessTokens;
use crate::constants::{CONFIG_PATH_ENV, DEFAULT_GIT_TIMEOUT, DEFAULT_HELM_TIMEOUT};

/// User-wide settings shared by every `fab` invocation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct GlobalConfig {
    /// Timeout in seconds applied to every `git` invocation.
    pub git_timeout_secs: u64,

    /// Timeout in seconds applied to every `helm` invocation.
    pub helm_timeout_secs: u64,

    /// Whether to load SSH identities (`ssh-add`) before cloning over SSH.
    pub ssh_agent: bool,

    /// Personal access tokens keyed by repository URL (or URL prefix).
    ///
    /// Tokens are injected into HTTPS clone URLs and are never logged.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub access_tokens: BTreeMap<String, String>,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            git_timeout_secs: DEFAULT_GIT_TIMEOUT.as_secs(),
            helm_timeout_secs: DEFAULT_HELM_TIMEOUT.as_secs(),
            ssh_agent: true,
            access_tokens: BTreeMap::new(),
        }
    }
}

impl GlobalConfig {
    /// Load global configuration from the default location.
    ///
    /// Returns the default configuration when the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub async fn load() -> Result<Self> {
        Self::load_with_optional(None).await
    }

    /// Load global configuration from `path`, or the default location when `None`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub async fn load_with_optional(path: Option<PathBuf>) -> Result<Self> {
        let path = match path {
            Some(path) => path,
            None => Self::default_path()?,
        };
        if path.exists() {
            Self::load_from(&path).await
        } else {
            tracing::debug!("No global config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Load global configuration from a specific file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid TOML for this schema.
    pub async fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read global config from {}", path.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse global config from {}", path.display()))
    }

    /// Default configuration path, honouring `FAB_CONFIG`.
    ///
    /// # Errors
    ///
    /// Returns an error if the home (or local data) directory cannot be determined.
    pub fn default_path() -> Result<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            return Ok(PathBuf::from(path));
        }

        let config_dir = if cfg!(target_os = "windows") {
            dirs::data_local_dir()
                .ok_or_else(|| anyhow::anyhow!("Unable to determine local data directory"))?
                .join("fab")
        } else {
            dirs::home_dir()
                .ok_or_else(|| anyhow::anyhow!("Unable to determine home directory"))?
                .join(".fab")
        };

        Ok(config_dir.join("config.toml"))
    }

    #[must_use]
    pub const fn git_timeout(&self) -> Duration {
        Duration::from_secs(self.git_timeout_secs)
    }

    #[must_use]
    pub const fn helm_timeout(&self) -> Duration {
        Duration::from_secs(self.helm_timeout_secs)
    }

    /// Build the concurrent token store used by git sources.
    #[must_use]
    pub fn access_tokens(&self) -> AccessTokens {
        let tokens = AccessTokens::new();
        for (repo, token) in &self.access_tokens {
            tokens.set(repo, token);
        }
        tokens
    }
}

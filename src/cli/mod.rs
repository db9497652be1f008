//! Command-line interface for fab.
//!
//! ```bash
//! fab install            # fetch the tree defined in ./component.yaml
//! fab install infra      # ... or in ./infra/component.yaml
//! fab generate           # render into ./_generated
//! fab --verbose install  # debug logging
//! ```
//!
//! All state (`_components/`, `_generated/`, `_install.lock.json`) lives in
//! the directory fab is invoked from.

mod generate;
mod install;

pub use generate::GenerateCommand;
pub use install::InstallCommand;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use crate::cache::CloneCoordinator;
use crate::config::GlobalConfig;
use crate::installer::Installer;
use crate::workspace::Workspace;

/// Settings derived from the global flags.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CliConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub log_level: String,
    /// Global config file given with `--config`
    pub config_path: Option<PathBuf>,
}

impl CliConfig {
    /// Install the global tracing subscriber.
    ///
    /// `RUST_LOG` takes precedence over the level chosen by the flags.
    pub fn init_logging(&self) {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.log_level));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .try_init();
    }
}

/// Compose cluster manifests from a tree of reusable components.
#[derive(Parser, Debug)]
#[command(name = "fab", version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug output
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only print errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Path to the global configuration file (default: ~/.fab/config.toml)
    #[arg(long, global = true, env = "FAB_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Fetch every component of the tree and write the install report
    Install(InstallCommand),

    /// Render installed components into `_generated/`
    Generate(GenerateCommand),
}

impl Cli {
    /// Run the parsed command.
    ///
    /// # Errors
    ///
    /// Returns the command's failure for [`crate::core::user_friendly_error`]
    /// to render.
    pub async fn execute(self) -> Result<()> {
        let config = self.build_config();
        config.init_logging();
        self.execute_with_config(config).await
    }

    #[must_use]
    pub fn build_config(&self) -> CliConfig {
        let log_level = if self.verbose {
            "debug"
        } else if self.quiet {
            "error"
        } else {
            "info"
        };
        CliConfig {
            log_level: log_level.to_string(),
            config_path: self.config.clone(),
        }
    }

    /// Run the command with already-derived settings; logging is left alone.
    pub async fn execute_with_config(self, config: CliConfig) -> Result<()> {
        let global = GlobalConfig::load_with_optional(config.config_path.clone()).await?;
        let workspace = Workspace::current().context("Failed to determine the current directory")?;
        let installer = Installer::new(workspace, Arc::new(CloneCoordinator::new()), global)?;

        match self.command {
            Commands::Install(cmd) => cmd.execute(&installer, self.quiet).await,
            Commands::Generate(cmd) => cmd.execute(&installer, self.quiet).await,
        }
    }
}

//! `fab install [DIR]`

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;

use crate::installer::Installer;

#[derive(Args, Debug)]
pub struct InstallCommand {
    /// Directory containing the root component definition
    #[arg(default_value = ".")]
    pub dir: PathBuf,
}

impl InstallCommand {
    pub async fn execute(self, installer: &Installer, quiet: bool) -> Result<()> {
        let report = installer.install(&self.dir).await?;
        if !quiet {
            println!(
                "{} Installed {} component(s), report written to {}",
                "✓".green(),
                report.components.len(),
                installer.workspace().report_path().display()
            );
        }
        Ok(())
    }
}

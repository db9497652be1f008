//! `fab generate [DIR]`

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;

use crate::installer::Installer;

#[derive(Args, Debug)]
pub struct GenerateCommand {
    /// Directory containing the root component definition
    #[arg(default_value = ".")]
    pub dir: PathBuf,
}

impl GenerateCommand {
    pub async fn execute(self, installer: &Installer, quiet: bool) -> Result<()> {
        let generated = installer.generate(&self.dir).await?;
        if quiet {
            return Ok(());
        }
        for component in &generated {
            println!(
                "  {} {} ({} bytes)",
                component.logical_path.cyan(),
                installer.workspace().relative(&component.output).display(),
                component.bytes
            );
        }
        println!("{} Generated {} manifest(s)", "✓".green(), generated.len());
        Ok(())
    }
}

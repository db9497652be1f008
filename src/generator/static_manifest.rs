use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use super::{Generatable, collect_yaml_files, require_exists, write_output};
use crate::constants::DOCUMENT_SEPARATOR;

/// Raw manifest files concatenated without decoding.
#[derive(Debug, Clone)]
pub struct StaticGenerator {
    manifest_path: PathBuf,
    output: PathBuf,
}

impl StaticGenerator {
    pub fn new(manifest_path: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            manifest_path: manifest_path.into(),
            output: output.into(),
        }
    }

    #[must_use]
    pub fn manifest_path(&self) -> &Path {
        &self.manifest_path
    }

    #[must_use]
    pub fn output_path(&self) -> &Path {
        &self.output
    }
}

impl Generatable for StaticGenerator {
    fn validate(&self) -> Result<()> {
        require_exists(&self.manifest_path, "static manifest path")
    }

    fn generate_path(&self) -> &Path {
        &self.output
    }

    async fn generate(&self) -> Result<usize> {
        let mut fragments = Vec::new();
        for file in collect_yaml_files(&self.manifest_path)? {
            let body = tokio::fs::read_to_string(&file)
                .await
                .with_context(|| format!("Failed to read manifest {}", file.display()))?;
            fragments.push(body);
        }
        tracing::debug!(
            "Concatenating {} manifest(s) from {}",
            fragments.len(),
            self.manifest_path.display()
        );
        write_output(&self.output, fragments.join(DOCUMENT_SEPARATOR).as_bytes())
    }
}

//! Render backends: turning an installed component into one manifest file.
//!
//! Every renderer writes `<output root>/<ancestry joined by "_">.yaml`, so
//! `root/monitoring/grafana` renders to `_generated/root_monitoring_grafana.yaml`.

mod helm;
mod static_manifest;

pub use helm::HelmGenerator;
pub use static_manifest::StaticGenerator;

use anyhow::Result;
use std::future::Future;
use std::path::{Path, PathBuf};

use crate::core::FabError;

/// A component that can be rendered into a manifest file.
pub trait Generatable {
    /// Check that the content to render exists.
    fn validate(&self) -> Result<()>;

    /// File the rendered manifest is written to.
    fn generate_path(&self) -> &Path;

    /// Render and write the manifest, returning the number of bytes written.
    fn generate(&self) -> impl Future<Output = Result<usize>> + Send;
}

/// The closed set of renderers, selected from a component's kind.
#[derive(Debug, Clone)]
pub enum Generator {
    Helm(HelmGenerator),
    Static(StaticGenerator),
}

impl Generatable for Generator {
    fn validate(&self) -> Result<()> {
        match self {
            Self::Helm(generator) => generator.validate(),
            Self::Static(generator) => generator.validate(),
        }
    }

    fn generate_path(&self) -> &Path {
        match self {
            Self::Helm(generator) => generator.generate_path(),
            Self::Static(generator) => generator.generate_path(),
        }
    }

    async fn generate(&self) -> Result<usize> {
        match self {
            Self::Helm(generator) => generator.generate().await,
            Self::Static(generator) => generator.generate().await,
        }
    }
}

/// Fail with [`FabError::InvalidGenerator`] unless `path` exists.
pub(crate) fn require_exists(path: &Path, what: &str) -> Result<()> {
    if path.exists() {
        return Ok(());
    }
    Err(FabError::InvalidGenerator {
        component: path.display().to_string(),
        reason: format!("{what} {} does not exist", path.display()),
    }
    .into())
}

/// Write `content` to `output`, replacing any previous render.
pub(crate) fn write_output(output: &Path, content: &[u8]) -> Result<usize> {
    crate::utils::fs::remove_path(output)?;
    crate::utils::fs::atomic_write(output, content)?;
    Ok(content.len())
}

/// Sorted `.yaml`/`.yml` files under `root` (or `root` itself when it is a file).
pub(crate) fn collect_yaml_files(root: &Path) -> Result<Vec<PathBuf>> {
    if root.is_file() {
        return Ok(vec![root.to_path_buf()]);
    }
    let mut files = Vec::new();
    for entry in walkdir::WalkDir::new(root).sort_by_file_name() {
        let entry = entry?;
        let is_yaml = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"));
        if entry.file_type().is_file() && is_yaml {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

use anyhow::{Context, Result};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use super::{Installer, collapse_duplicates, enqueue_children, splice_remote};
use crate::component::{Component, HookKind, Kind};
use crate::core::FabError;
use crate::generator::{Generatable, Generator};
use crate::helm;
use crate::lockfile::InstallReport;

/// One rendered manifest file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedComponent {
    pub logical_path: String,
    pub output: PathBuf,
    pub bytes: usize,
}

impl Installer {
    /// Render every component reachable from the definition in `start_dir`
    /// into `_generated/`, using the content recorded by the last install.
    ///
    /// Nothing is fetched: remote components are found through the install
    /// report. Disabled components are skipped together with their
    /// generate hooks.
    ///
    /// # Errors
    ///
    /// - [`FabError::NotInstalled`] when a remote component has no report
    ///   entry
    /// - the first failing generate hook or renderer
    pub async fn generate(&self, start_dir: &Path) -> Result<Vec<GeneratedComponent>> {
        let report = InstallReport::load(&self.workspace.report_path())?;
        let visited = self.resolve_installed(start_dir, &report)?;

        let output_root = self.workspace.generate_dir();
        let mut helm_checked = false;
        let mut generated = Vec::new();

        for component in &visited {
            let logical = component.logical_path();
            if component.config.is_disabled() {
                tracing::info!(target: "fab::install", "Skipping disabled component {logical}");
                continue;
            }

            component
                .run_hook(HookKind::BeforeGenerate)
                .await
                .with_context(|| format!("before-generate hook of {logical} failed"))?;

            if let Some(generator) = component.to_generator(&output_root, self.config.helm_timeout())? {
                if matches!(generator, Generator::Helm(_)) && !helm_checked {
                    let info = helm::ensure_supported_version(self.config.helm_timeout()).await?;
                    tracing::debug!(target: "helm", "Using helm {}", info.version);
                    helm_checked = true;
                }

                generator.validate().with_context(|| format!("Cannot generate {logical}"))?;
                let bytes = generator.generate().await.with_context(|| format!("Failed to generate {logical}"))?;
                let output = generator.generate_path().to_path_buf();
                tracing::info!(
                    target: "fab::install",
                    "Generated {logical} -> {} ({bytes} bytes)",
                    self.workspace.relative(&output).display()
                );
                generated.push(GeneratedComponent {
                    logical_path: logical.to_string(),
                    output,
                    bytes,
                });
            }

            component
                .run_hook(HookKind::AfterGenerate)
                .await
                .with_context(|| format!("after-generate hook of {logical} failed"))?;
        }

        Ok(generated)
    }

    /// The install walk replayed against `report` instead of fetching.
    fn resolve_installed(&self, start_dir: &Path, report: &InstallReport) -> Result<Vec<Component>> {
        let root = Component::load(&self.workspace.resolve(start_dir), "")?;
        let mut queue = VecDeque::from([root]);
        let mut visited = Vec::new();

        while let Some(mut first) = queue.pop_front() {
            first.validate()?;
            enqueue_children(&first, &mut queue);

            if first.is_remote() {
                let Some(physical) = report.physical_path(first.logical_path()) else {
                    return Err(FabError::NotInstalled {
                        logical_path: first.logical_path().to_string(),
                    }
                    .into());
                };
                first.set_physical_path(self.workspace.resolve(physical));
                if first.kind == Kind::Component {
                    splice_remote(&first, &mut queue)?;
                }
            }
            visited.push(first);
        }
        collapse_duplicates(visited)
    }
}

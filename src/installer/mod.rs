//! Walking the component tree: fetching on install, rendering on generate.
//!
//! Both steps drain the same FIFO worklist, seeded with the root component
//! loaded from the start directory. For every dequeued component `first`:
//!
//! 1. its name is validated
//! 2. its declared sub-components are stamped as its children and appended
//! 3. (install) `before-install` hooks run; a failure is logged and ignored
//! 4. a component with a fetch method gets its content: install fetches it
//!    through the [`CloneCoordinator`], generate looks the destination up in
//!    the install report
//! 5. a fetched `type: component` has its own definition loaded from the
//!    fetched content and appended, with `first`'s configuration overlaid
//! 6. (install) `after-install` hooks run; a failure aborts the run
//!
//! Appending at the tail keeps the visit order breadth-first: siblings are
//! visited before a remote tree's children are spliced in after them.
//!
//! A logical path names exactly one component. Visiting the same declaration
//! twice (identical fields and content location) collapses into one entry;
//! two different declarations under one logical path are rejected.

mod generate;

pub use generate::GeneratedComponent;

use anyhow::{Context, Result};
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::Arc;

use crate::cache::CloneCoordinator;
use crate::component::{Component, HookKind, Kind};
use crate::config::GlobalConfig;
use crate::core::FabError;
use crate::lockfile::InstallReport;
use crate::source::{FetchContext, Installable};
use crate::workspace::Workspace;

/// Drives `fab install` and `fab generate` for one workspace.
#[derive(Debug)]
pub struct Installer {
    workspace: Workspace,
    coordinator: Arc<CloneCoordinator>,
    config: GlobalConfig,
    ctx: Arc<FetchContext>,
}

impl Installer {
    /// # Errors
    ///
    /// Fails when the fetch context (HTTP client) cannot be built.
    pub fn new(workspace: Workspace, coordinator: Arc<CloneCoordinator>, config: GlobalConfig) -> Result<Self> {
        let ctx = Arc::new(FetchContext::new(&workspace, &config)?);
        Ok(Self {
            workspace,
            coordinator,
            config,
            ctx,
        })
    }

    #[must_use]
    pub const fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    /// Fetch every component reachable from the definition in `start_dir`
    /// and write the install report.
    ///
    /// `start_dir` is resolved against the workspace root.
    ///
    /// # Errors
    ///
    /// Fails on the first invalid definition, fetch failure or failing
    /// `after-install` hook. A logical path shared by two different
    /// declarations fails before the report is written.
    pub async fn install(&self, start_dir: &Path) -> Result<InstallReport> {
        let root = Component::load(&self.workspace.resolve(start_dir), "")?;
        let mut queue = VecDeque::from([root]);
        let mut visited = Vec::new();

        while let Some(mut first) = queue.pop_front() {
            first.validate()?;
            enqueue_children(&first, &mut queue);
            tracing::info!(target: "fab::install", "Installing {}", first.logical_path());

            if let Err(e) = first.run_hook(HookKind::BeforeInstall).await {
                tracing::warn!(
                    target: "fab::install",
                    "({}) before-install hook failed, continuing: {e:#}",
                    first.logical_path()
                );
            }

            if let Some(source) = first.to_source(&self.ctx) {
                let logical = first.logical_path().to_string();
                source.validate().with_context(|| format!("Invalid source for component {logical}"))?;
                let dest = source.lock_path()?;
                tracing::debug!(
                    target: "fab::install",
                    "({logical}) fetching {} into {}",
                    source.describe(),
                    dest.display()
                );
                self.coordinator
                    .run(&dest, || async {
                        source.clean()?;
                        source.install().await
                    })
                    .await
                    .with_context(|| format!("Failed to fetch component {logical}"))?;
                first.set_physical_path(dest);

                if first.kind == Kind::Component {
                    splice_remote(&first, &mut queue)?;
                }
            }

            first
                .run_hook(HookKind::AfterInstall)
                .await
                .with_context(|| format!("after-install hook of {} failed", first.logical_path()))?;
            visited.push(first);
        }

        let visited = collapse_duplicates(visited)?;
        let report = self.build_report(&visited)?;
        report.save(&self.workspace.report_path())?;
        tracing::info!(
            target: "fab::install",
            "Installed {} component(s), {} fetch(es)",
            report.components.len(),
            self.coordinator.fetch_count()
        );
        Ok(report)
    }

    fn build_report(&self, visited: &[Component]) -> Result<InstallReport> {
        let mut report = InstallReport::new();
        for component in visited {
            report.record(component.logical_path(), self.workspace.relative(component.physical_path()))?;
        }
        Ok(report)
    }
}

/// Drop repeated visits of one declaration, keeping the first.
///
/// # Errors
///
/// Returns [`FabError::DuplicateLogicalPath`] when two visited components
/// share a logical path but differ in any declared field or in where their
/// content lives.
fn collapse_duplicates(visited: Vec<Component>) -> Result<Vec<Component>> {
    let mut unique: Vec<Component> = Vec::with_capacity(visited.len());
    let mut index: HashMap<String, usize> = HashMap::new();

    for component in visited {
        match index.get(component.logical_path()).copied() {
            Some(at) if unique[at] == component => {
                tracing::debug!(target: "fab::install", "Collapsing repeated {}", component.logical_path());
            }
            Some(at) => {
                return Err(FabError::DuplicateLogicalPath {
                    logical_path: component.logical_path().to_string(),
                    existing: unique[at].content_path().display().to_string(),
                    new: component.content_path().display().to_string(),
                }
                .into());
            }
            None => {
                index.insert(component.logical_path().to_string(), unique.len());
                unique.push(component);
            }
        }
    }
    Ok(unique)
}

/// Append `first`'s declared sub-components, stamped as its children.
fn enqueue_children(first: &Component, queue: &mut VecDeque<Component>) {
    for declared in &first.subcomponents {
        queue.push_back(first.child(declared));
    }
}

/// Append the component tree found in `first`'s fetched content.
fn splice_remote(first: &Component, queue: &mut VecDeque<Component>) -> Result<()> {
    let dir = first.remote_definition_dir();
    let mut remote = Component::load(&dir, first.logical_path())
        .with_context(|| format!("Failed to load component tree fetched for {}", first.logical_path()))?;
    remote.config.overlay(&first.config);
    tracing::debug!(
        target: "fab::install",
        "({}) spliced remote tree {} from {}",
        first.logical_path(),
        remote.logical_path(),
        dir.display()
    );
    queue.push_back(remote);
    Ok(())
}

//! The declarative component tree.
//!
//! A component is declared by exactly one definition file in its directory:
//!
//! ```yaml
//! # component.yaml
//! name: monitoring
//! subcomponents:
//!   - name: prometheus
//!     type: helm
//!     method: helm
//!     source: https://prometheus-community.github.io/helm-charts
//!     path: prometheus
//!     version: 25.8.0
//!   - name: dashboards
//!     type: static
//!     method: local
//!     source: ./dashboards
//!   - name: logging
//!     method: git
//!     source: https://github.com/example/logging-stack
//!     branch: main
//! ```
//!
//! `type` selects how a component is rendered and `method` how it is fetched.
//! A `type: component` entry with a fetch method points at another component
//! tree whose definition is loaded from the fetched content.
//!
//! Besides the declared fields every component carries two derived ones: the
//! logical path (names of its ancestry joined with `/`, its identity within a
//! run) and the physical path (where its content lives on disk).

pub mod config;
pub mod hooks;

pub use config::ComponentConfig;
pub use hooks::{HookKind, Hooks};

use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::constants::COMPONENT_PATH_SEPARATOR;
use crate::core::FabError;
use crate::generator::{Generator, HelmGenerator, StaticGenerator};
use crate::source::{FetchContext, GitSource, HelmSource, HttpSource, LocalSource, Source};

/// How a component is rendered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Kind {
    /// Plain grouping node, rendered only through its children
    #[default]
    #[serde(alias = "")]
    Component,
    /// Chart rendered with `helm template`
    Helm,
    /// Raw manifest files concatenated as-is
    Static,
}

/// How a component's content is fetched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    /// Content lives next to the definition
    #[default]
    #[serde(rename = "", alias = "none")]
    None,
    Git,
    Helm,
    Local,
    Http,
}

/// One node of the component tree.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Component {
    pub name: String,

    #[serde(rename = "type")]
    pub kind: Kind,

    pub method: Method,

    /// Locator of the content: repository URL, chart repository, local path or URL
    #[serde(skip_serializing_if = "String::is_empty")]
    pub source: String,

    /// Sub-path inside the fetched content, or the chart name for `method: helm`
    #[serde(skip_serializing_if = "String::is_empty")]
    pub path: String,

    /// Commit SHA for git, chart version for helm
    #[serde(skip_serializing_if = "String::is_empty")]
    pub version: String,

    /// Branch to track (git only)
    #[serde(skip_serializing_if = "String::is_empty")]
    pub branch: String,

    pub config: ComponentConfig,

    pub hooks: Hooks,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub subcomponents: Vec<Component>,

    #[serde(skip)]
    logical_path: String,

    #[serde(skip)]
    physical_path: PathBuf,
}

impl Component {
    /// Load the component defined in `dir`, as a child of `parent_logical_path`.
    ///
    /// The directory must contain exactly one file named `component.yaml`,
    /// `component.yml` or `component.json` (case-insensitive). The loaded
    /// component's physical path is `dir`.
    ///
    /// # Errors
    ///
    /// - [`FabError::DefinitionNotFound`] when no definition file exists
    ///   (or `dir` is not a directory)
    /// - [`FabError::AmbiguousDefinition`] when more than one exists
    /// - [`FabError::DefinitionParseError`] when the file does not decode
    pub fn load(dir: &Path, parent_logical_path: &str) -> Result<Self> {
        let definition = find_definition(dir)?;
        let content = fs::read_to_string(&definition)
            .with_context(|| format!("Failed to read {}", definition.display()))?;

        let is_json = definition
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        let parsed = if is_json {
            serde_json::from_str::<Self>(&content).map_err(|e| e.to_string())
        } else {
            serde_yaml::from_str::<Self>(&content).map_err(|e| e.to_string())
        };
        let mut component = parsed.map_err(|reason| FabError::DefinitionParseError {
            file: definition.display().to_string(),
            reason,
        })?;

        component.logical_path = join_logical(parent_logical_path, &component.name);
        component.physical_path = dir.to_path_buf();
        tracing::debug!(
            target: "fab::component",
            "Loaded {} from {}",
            component.logical_path,
            definition.display()
        );
        Ok(component)
    }

    #[must_use]
    pub fn logical_path(&self) -> &str {
        &self.logical_path
    }

    #[must_use]
    pub fn physical_path(&self) -> &Path {
        &self.physical_path
    }

    /// Record where the component's content was materialized.
    pub fn set_physical_path(&mut self, path: impl Into<PathBuf>) {
        self.physical_path = path.into();
    }

    /// Whether the component's content has to be fetched.
    #[must_use]
    pub fn is_remote(&self) -> bool {
        self.method != Method::None
    }

    /// Logical path segments joined into the output file stem.
    #[must_use]
    pub fn output_stem(&self) -> String {
        self.logical_path
            .split('/')
            .filter(|segment| !segment.is_empty())
            .collect::<Vec<_>>()
            .join(COMPONENT_PATH_SEPARATOR)
    }

    /// Check the declared name.
    ///
    /// # Errors
    ///
    /// Returns [`FabError::InvalidComponent`] when the name is empty or
    /// contains a path separator.
    pub fn validate(&self) -> Result<()> {
        let re = Regex::new(r"^[^/\\]+$")?;
        if !re.is_match(&self.name) {
            return Err(FabError::InvalidComponent {
                name: self.name.clone(),
                reason: "name must be non-empty and must not contain '/' or '\\'".to_string(),
            }
            .into());
        }
        Ok(())
    }

    /// A declared sub-component stamped as a child of `self`.
    ///
    /// The child inherits `self`'s physical path provisionally and gets the
    /// overlay `self` declares for it merged over its own configuration.
    #[must_use]
    pub fn child(&self, declared: &Self) -> Self {
        let mut child = declared.clone();
        child.logical_path = join_logical(&self.logical_path, &declared.name);
        child.physical_path = self.physical_path.clone();
        if let Some(overlay) = self.config.subcomponent(&declared.name) {
            child.config.overlay(overlay);
        }
        child
    }

    /// Fetch backend for the declared method, or `None` for local content.
    #[must_use]
    pub fn to_source(&self, ctx: &Arc<FetchContext>) -> Option<Source> {
        let non_empty = |s: &str| Some(s.to_string()).filter(|s| !s.is_empty());
        let ctx = Arc::clone(ctx);
        match self.method {
            Method::None => None,
            Method::Git => Some(Source::Git(GitSource::new(
                &self.source,
                non_empty(&self.version),
                non_empty(&self.branch),
                ctx,
            ))),
            Method::Helm => Some(Source::Helm(HelmSource::new(
                &self.source,
                &self.path,
                non_empty(&self.version),
                ctx,
            ))),
            Method::Local => {
                Some(Source::Local(LocalSource::new(self.physical_path.join(&self.source), ctx)))
            }
            Method::Http => Some(Source::Http(HttpSource::new(&self.source, ctx))),
        }
    }

    /// Directory a fetched component tree's definition is loaded from.
    ///
    /// For charts the fetch destination already names the chart, so `path`
    /// is not joined again.
    #[must_use]
    pub fn remote_definition_dir(&self) -> PathBuf {
        if self.method == Method::Helm || self.path.is_empty() {
            self.physical_path.clone()
        } else {
            self.physical_path.join(&self.path)
        }
    }

    /// Renderer for this component, or `None` for plain grouping nodes.
    ///
    /// # Errors
    ///
    /// Returns [`FabError::InvalidGenerator`] when the logical path is empty.
    pub fn to_generator(&self, output_root: &Path, helm_timeout: Duration) -> Result<Option<Generator>> {
        if self.kind == Kind::Component {
            return Ok(None);
        }
        let stem = self.output_stem();
        if stem.is_empty() {
            return Err(FabError::InvalidGenerator {
                component: self.name.clone(),
                reason: "component has no ancestry to name its output after".to_string(),
            }
            .into());
        }
        let output = output_root.join(format!("{stem}.yaml"));
        let content = self.content_path();

        Ok(Some(match self.kind {
            Kind::Helm => Generator::Helm(
                HelmGenerator::new(content, output, stem)
                    .with_component(self.logical_path.clone())
                    .with_values(self.config.values.clone())
                    .with_namespace(self.config.namespace().map(str::to_string))
                    .with_inject_namespace(self.config.inject_namespace())
                    .with_timeout(helm_timeout),
            ),
            Kind::Static => Generator::Static(StaticGenerator::new(content, output)),
            Kind::Component => return Ok(None),
        }))
    }

    /// Where the renderer finds this component's content.
    #[must_use]
    pub fn content_path(&self) -> PathBuf {
        let joins_path = match (self.kind, self.method) {
            (Kind::Helm, Method::Helm) | (_, Method::Http) => false,
            _ => !self.path.is_empty(),
        };
        if joins_path { self.physical_path.join(&self.path) } else { self.physical_path.clone() }
    }

    /// Run one lifecycle hook's commands in the component's directory.
    ///
    /// # Errors
    ///
    /// Returns [`FabError::HookFailed`] for the first failing command.
    pub async fn run_hook(&self, kind: HookKind) -> Result<()> {
        let commands = self.hooks.commands(kind);
        if commands.is_empty() {
            return Ok(());
        }
        let dir = if self.physical_path.is_file() {
            self.physical_path.parent().unwrap_or(self.physical_path.as_path())
        } else {
            self.physical_path.as_path()
        };
        hooks::run_commands(kind, commands, dir, &self.logical_path).await
    }
}

fn join_logical(parent: &str, name: &str) -> String {
    if parent.is_empty() { name.to_string() } else { format!("{parent}/{name}") }
}

fn find_definition(dir: &Path) -> Result<PathBuf> {
    let not_found = || FabError::DefinitionNotFound {
        directory: dir.display().to_string(),
    };
    if !dir.is_dir() {
        return Err(not_found().into());
    }

    let re = Regex::new(r"(?i)^component\.(ya?ml|json)$")?;
    let mut matches = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("Failed to read {}", dir.display()))? {
        let entry = entry?;
        let is_match = entry.file_name().to_str().is_some_and(|name| re.is_match(name));
        if is_match && entry.file_type()?.is_file() {
            matches.push(entry.path());
        }
    }
    matches.sort();

    match matches.as_slice() {
        [] => Err(not_found().into()),
        [single] => Ok(single.clone()),
        [first, second, ..] => Err(FabError::AmbiguousDefinition {
            directory: dir.display().to_string(),
            first: first.display().to_string(),
            second: second.display().to_string(),
        }
        .into()),
    }
}

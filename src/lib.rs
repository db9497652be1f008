//! fab - compose cluster manifests from a tree of reusable components.
//!
//! A component tree is declared with `component.yaml` files. Each component
//! either groups other components, renders a Helm chart, or contributes raw
//! manifests, and may fetch its content from git, a chart repository, the
//! local workspace or a plain URL.
//!
//! Two steps operate on the tree:
//!
//! - `fab install` walks the tree, fetches every remote component into
//!   `_components/` and records where everything landed in
//!   `_install.lock.json`
//! - `fab generate` walks the same tree without fetching and renders every
//!   chart and static component into `_generated/<ancestry>.yaml`
//!
//! # Modules
//!
//! - [`locator`] - locator to filesystem path codec
//! - [`source`] - fetch backends (git, helm, local, http)
//! - [`cache`] - single-flight coordination of fetches
//! - [`component`] - the component model, definition loading, overlays, hooks
//! - [`installer`] - the install and generate walks
//! - [`lockfile`] - the install report
//! - [`generator`] - render backends (helm, static)
//! - [`manifest`] - document values, YAML codec, merge and namespace injection
//!
//! Supporting modules: [`core`] (errors), [`config`] (global configuration),
//! [`git`], [`helm`] and [`ssh`] (external tool wrappers), [`utils`],
//! [`workspace`], [`constants`] and [`cli`].

pub mod cache;
pub mod cli;
pub mod component;
pub mod config;
pub mod constants;
pub mod core;
pub mod generator;
pub mod git;
pub mod helm;
pub mod installer;
pub mod locator;
pub mod lockfile;
pub mod manifest;
pub mod source;
pub mod ssh;
pub mod utils;
pub mod workspace;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

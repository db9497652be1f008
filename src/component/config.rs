//! Per-component configuration and parent-to-child overlays.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::manifest::Mapping;

/// The `config` block of a component definition.
///
/// ```yaml
/// config:
///   namespace: monitoring
///   injectNamespace: true
///   values:
///     replicas: 2
///   subcomponents:
///     grafana:
///       values: { adminUser: root }
/// ```
///
/// Scalar settings are optional so an overlay can tell "not set" apart from
/// an explicit `false`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ComponentConfig {
    /// Target namespace for rendered documents
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    /// Write [`Self::namespace`] into each rendered document's metadata
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inject_namespace: Option<bool>,

    /// Skip generation of this component
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disabled: Option<bool>,

    /// Free-form values handed to the templating backend
    #[serde(skip_serializing_if = "Mapping::is_empty")]
    pub values: Mapping,

    /// Overlays applied to the named children of this component
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub subcomponents: BTreeMap<String, ComponentConfig>,
}

impl ComponentConfig {
    /// Merge `overlay` over `self`; `overlay` wins.
    ///
    /// Scalars that are set in `overlay` replace those in `self`, `values`
    /// maps merge recursively (lists replace), and child overlays merge per
    /// child name.
    pub fn overlay(&mut self, overlay: &Self) {
        if overlay.namespace.is_some() {
            self.namespace.clone_from(&overlay.namespace);
        }
        if overlay.inject_namespace.is_some() {
            self.inject_namespace = overlay.inject_namespace;
        }
        if overlay.disabled.is_some() {
            self.disabled = overlay.disabled;
        }
        self.values.merge(&overlay.values);
        for (name, child) in &overlay.subcomponents {
            self.subcomponents.entry(name.clone()).or_default().overlay(child);
        }
    }

    /// Overlay declared for the child named `name`.
    #[must_use]
    pub fn subcomponent(&self, name: &str) -> Option<&Self> {
        self.subcomponents.get(name)
    }

    #[must_use]
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref().filter(|ns| !ns.is_empty())
    }

    #[must_use]
    pub fn inject_namespace(&self) -> bool {
        self.inject_namespace.unwrap_or(false)
    }

    #[must_use]
    pub fn is_disabled(&self) -> bool {
        self.disabled.unwrap_or(false)
    }
}

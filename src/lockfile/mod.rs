//! The install report: `_install.lock.json`.
//!
//! `fab install` records where every component of the tree ended up, in walk
//! order, and `fab generate` reads it back to find fetched content without
//! fetching again.
//!
//! ```json
//! {
//!   "_notes": ["This file is auto generated via `fab install`", "..."],
//!   "components": {
//!     "root": ".",
//!     "root/prometheus": "_components/prometheus-community.github.io/helm-charts/prometheus/25.8.0"
//!   }
//! }
//! ```
//!
//! The `components` object keeps insertion order on disk and in memory; two
//! installs of an unchanged tree produce byte-identical files.

use anyhow::{Context, Result};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::core::FabError;
use crate::utils::fs::atomic_write;

/// Informational notes written at the top of every report.
pub const REPORT_NOTES: [&str; 6] = [
    "This file is auto generated via `fab install`",
    "This file is consumed by `fab generate`",
    "The API for this file is unstable -- do not build tooling around it",
    "Order of components matters",
    "This files location relative to directory where `fab install` was called matters -- do not move it",
    "Do not modify unless you know what you are doing!",
];

/// Ordered `logical path -> physical path` entries of one install run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallReport {
    #[serde(rename = "_notes", default)]
    pub notes: Vec<String>,

    #[serde(default)]
    pub components: Components,
}

/// Report entries in walk order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Components(Vec<(String, PathBuf)>);

impl Components {
    #[must_use]
    pub fn get(&self, logical_path: &str) -> Option<&Path> {
        self.0.iter().find(|(logical, _)| logical == logical_path).map(|(_, physical)| physical.as_path())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Path)> {
        self.0.iter().map(|(logical, physical)| (logical.as_str(), physical.as_path()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for InstallReport {
    fn default() -> Self {
        Self::new()
    }
}

impl InstallReport {
    #[must_use]
    pub fn new() -> Self {
        Self {
            notes: REPORT_NOTES.iter().map(ToString::to_string).collect(),
            components: Components::default(),
        }
    }

    /// Append an entry.
    ///
    /// A repeated logical path with the same physical path is collapsed into
    /// the first entry.
    ///
    /// # Errors
    ///
    /// Returns [`FabError::DuplicateLogicalPath`] when `logical_path` is
    /// already recorded with a different physical path.
    pub fn record(&mut self, logical_path: &str, physical_path: impl Into<PathBuf>) -> Result<()> {
        let physical_path = physical_path.into();
        if let Some(existing) = self.components.get(logical_path) {
            if existing == physical_path {
                return Ok(());
            }
            return Err(FabError::DuplicateLogicalPath {
                logical_path: logical_path.to_string(),
                existing: existing.display().to_string(),
                new: physical_path.display().to_string(),
            }
            .into());
        }
        self.components.0.push((logical_path.to_string(), physical_path));
        Ok(())
    }

    /// Physical path recorded for `logical_path`.
    #[must_use]
    pub fn physical_path(&self, logical_path: &str) -> Option<&Path> {
        self.components.get(logical_path)
    }

    /// Read a report written by [`InstallReport::save`].
    ///
    /// # Errors
    ///
    /// Fails when the file is missing or is not a report.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).with_context(|| {
            format!("Cannot read install report {} (run `fab install` first)", path.display())
        })?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse install report {}", path.display()))
    }

    /// Write the report atomically as pretty printed JSON.
    ///
    /// # Errors
    ///
    /// Fails when the report cannot be serialized or written.
    pub fn save(&self, path: &Path) -> Result<()> {
        let mut content = serde_json::to_string_pretty(self).context("Failed to serialize install report")?;
        content.push('\n');
        atomic_write(path, content.as_bytes())
            .with_context(|| format!("Failed to write install report {}", path.display()))
    }
}

impl Serialize for Components {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (logical, physical) in &self.0 {
            map.serialize_entry(logical, physical)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Components {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct OrderedVisitor;

        impl<'de> Visitor<'de> for OrderedVisitor {
            type Value = Components;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of logical paths to physical paths")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((logical, physical)) = access.next_entry::<String, PathBuf>()? {
                    entries.push((logical, physical));
                }
                Ok(Components(entries))
            }
        }

        deserializer.deserialize_map(OrderedVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ErrorCategory;
    use tempfile::TempDir;

    #[test]
    fn test_record_keeps_order_and_collapses_identical() {
        let mut report = InstallReport::new();
        report.record("root", ".").unwrap();
        report.record("root/zeta", "_components/z").unwrap();
        report.record("root/alpha", "_components/a").unwrap();
        report.record("root/zeta", "_components/z").unwrap();

        let logical: Vec<_> = report.components.iter().map(|(l, _)| l).collect();
        assert_eq!(logical, ["root", "root/zeta", "root/alpha"]);
    }

    #[test]
    fn test_record_rejects_conflicting_duplicate() {
        let mut report = InstallReport::new();
        report.record("root/web", "a").unwrap();
        let err = report.record("root/web", "b").unwrap_err();
        let fab = err.downcast_ref::<FabError>().unwrap();
        assert!(matches!(fab, FabError::DuplicateLogicalPath { .. }));
        assert_eq!(fab.category(), ErrorCategory::Consistency);
    }

    #[test]
    fn test_save_load_preserves_order_and_format() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("_install.lock.json");
        let mut report = InstallReport::new();
        report.record("root", ".").unwrap();
        report.record("root/b", "_components/b").unwrap();
        report.record("root/a", "_components/a").unwrap();
        report.save(&path).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("{\n  \"_notes\": [\n"));
        assert!(content.find("root/b").unwrap() < content.find("root/a").unwrap());

        let loaded = InstallReport::load(&path).unwrap();
        assert_eq!(loaded, report);
        assert_eq!(loaded.physical_path("root/a"), Some(Path::new("_components/a")));
        assert_eq!(loaded.notes.len(), REPORT_NOTES.len());
    }

    #[test]
    fn test_load_missing_report() {
        let temp = TempDir::new().unwrap();
        let err = InstallReport::load(&temp.path().join("_install.lock.json")).unwrap_err();
        assert!(format!("{err:#}").contains("fab install"));
    }
}

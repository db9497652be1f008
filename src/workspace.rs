//! The directory a run operates in and the layout fab derives from it.

use std::path::{Path, PathBuf};

use crate::constants::{GENERATE_DIR_NAME, INSTALL_DIR_NAME, INSTALL_REPORT_NAME};

/// Root directory of a `fab install` / `fab generate` run.
///
/// Everything fab writes lives under this root:
///
/// ```text
/// <root>/
/// ├── _components/         fetched sources
/// ├── _generated/          rendered manifests
/// └── _install.lock.json   install report
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
        }
    }

    /// Workspace rooted at the process working directory.
    ///
    /// # Errors
    ///
    /// Fails when the working directory cannot be determined.
    pub fn current() -> std::io::Result<Self> {
        std::env::current_dir().map(Self::new)
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn install_dir(&self) -> PathBuf {
        self.root.join(INSTALL_DIR_NAME)
    }

    #[must_use]
    pub fn generate_dir(&self) -> PathBuf {
        self.root.join(GENERATE_DIR_NAME)
    }

    #[must_use]
    pub fn report_path(&self) -> PathBuf {
        self.root.join(INSTALL_REPORT_NAME)
    }

    /// Resolve `path` against the root unless it is already absolute.
    #[must_use]
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() { path.to_path_buf() } else { self.root.join(path) }
    }

    /// `path` relative to the root when it lives under it, unchanged otherwise.
    ///
    /// The root itself is `.`.
    #[must_use]
    pub fn relative(&self, path: &Path) -> PathBuf {
        match path.strip_prefix(&self.root) {
            Ok(rel) if rel.as_os_str().is_empty() => PathBuf::from("."),
            Ok(rel) => rel.to_path_buf(),
            Err(_) => path.to_path_buf(),
        }
    }
}

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::{FetchContext, Installable};
use crate::constants::LOCAL_DIR_NAME;
use crate::core::FabError;
use crate::utils::fs::{copy_dir, ensure_dir, remove_path};

/// A directory or file inside the workspace, copied into `_components/_local/`.
#[derive(Debug, Clone)]
pub struct LocalSource {
    root: PathBuf,
    ctx: Arc<FetchContext>,
}

impl LocalSource {
    pub fn new(root: impl Into<PathBuf>, ctx: Arc<FetchContext>) -> Self {
        Self {
            root: root.into(),
            ctx,
        }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Whether the root names a single file rather than a directory.
    #[must_use]
    pub fn is_file(&self) -> bool {
        self.root.is_file()
    }

    /// Path the copied root ends up at: the destination directory itself, or
    /// the file inside it when the root is a file.
    pub fn copied_root(&self) -> Result<PathBuf> {
        let dest = self.install_path()?;
        Ok(match (self.is_file(), self.root.file_name()) {
            (true, Some(name)) => dest.join(name),
            _ => dest,
        })
    }

    fn invalid(&self, reason: impl Into<String>) -> anyhow::Error {
        FabError::InvalidSource {
            component: self.root.display().to_string(),
            reason: reason.into(),
        }
        .into()
    }

    /// Canonical root and its path relative to the canonical boundary.
    fn resolve(&self) -> Result<(PathBuf, PathBuf)> {
        if self.root.as_os_str().is_empty() {
            return Err(self.invalid("local source root must not be empty"));
        }
        let root = match fs::canonicalize(&self.root) {
            Ok(root) => root,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(self.invalid("local source root does not exist"));
            }
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to resolve {}", self.root.display()));
            }
        };
        let boundary = fs::canonicalize(self.ctx.boundary()).with_context(|| {
            format!("Failed to resolve workspace root {}", self.ctx.boundary().display())
        })?;

        let Ok(relative) = root.strip_prefix(&boundary) else {
            return Err(self.invalid(format!(
                "local source root must be inside the workspace {}",
                boundary.display()
            )));
        };
        if relative.as_os_str().is_empty() && root.is_dir() {
            return Err(self.invalid("local source root cannot be the workspace root itself"));
        }
        let relative = relative.to_path_buf();
        Ok((root, relative))
    }
}

impl Installable for LocalSource {
    fn validate(&self) -> Result<()> {
        self.resolve().map(|_| ())
    }

    fn install_path(&self) -> Result<PathBuf> {
        let (root, relative) = self.resolve()?;
        let relative = if root.is_dir() {
            relative.as_path()
        } else {
            relative.parent().unwrap_or_else(|| Path::new(""))
        };
        self.ctx.destination(&Path::new(LOCAL_DIR_NAME).join(relative))
    }

    async fn install(&self) -> Result<()> {
        let dest = self.install_path()?;
        if self.root.is_dir() {
            remove_path(&dest)?;
            copy_dir(&self.root, &dest)?;
        } else {
            let target = self.copied_root()?;
            ensure_dir(&dest)?;
            fs::copy(&self.root, &target).with_context(|| {
                format!("Failed to copy {} to {}", self.root.display(), target.display())
            })?;
        }
        tracing::debug!("Copied {} into {}", self.root.display(), dest.display());
        Ok(())
    }

    // The content belongs to the workspace; an install overwrites it in place.
    fn clean(&self) -> Result<()> {
        Ok(())
    }

    fn lock_path(&self) -> Result<PathBuf> {
        self.copied_root()
    }
}

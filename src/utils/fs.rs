//! File system helpers shared by the source and render backends.
//!
//! Writes go through [`atomic_write`] (temp file + rename) so an interrupted
//! run never leaves a half-written report or manifest behind.

use anyhow::{Context, Result};
use std::fs;
use std::io::Write;
use std::path::Path;

/// Ensures a directory exists, creating it and all parents if necessary.
///
/// # Errors
///
/// Fails if the path exists but is not a directory, or creation fails.
pub fn ensure_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        fs::create_dir_all(path)
            .with_context(|| format!("Failed to create directory: {}", path.display()))?;
    } else if !path.is_dir() {
        return Err(anyhow::anyhow!("Path exists but is not a directory: {}", path.display()));
    }
    Ok(())
}

/// Removes a file or directory tree. Missing paths are not an error.
pub fn remove_path(path: &Path) -> Result<()> {
    match fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(path)
            .with_context(|| format!("Failed to remove directory: {}", path.display())),
        Ok(_) => fs::remove_file(path)
            .with_context(|| format!("Failed to remove file: {}", path.display())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).with_context(|| format!("Failed to inspect: {}", path.display())),
    }
}

/// Copies a directory tree. Symlinks and special files are skipped.
pub fn copy_dir(src: &Path, dst: &Path) -> Result<()> {
    ensure_dir(dst)?;

    for entry in
        fs::read_dir(src).with_context(|| format!("Failed to read directory: {}", src.display()))?
    {
        let entry = entry?;
        let file_type = entry.file_type()?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());

        if file_type.is_dir() {
            copy_dir(&src_path, &dst_path)?;
        } else if file_type.is_file() {
            fs::copy(&src_path, &dst_path).with_context(|| {
                format!("Failed to copy file from {} to {}", src_path.display(), dst_path.display())
            })?;
        }
    }

    Ok(())
}

/// Moves a directory into place, replacing anything at `dst`.
///
/// Falls back to copy + remove when a rename is impossible (e.g. the temp
/// directory lives on another filesystem).
pub fn move_dir(src: &Path, dst: &Path) -> Result<()> {
    remove_path(dst)?;
    if let Some(parent) = dst.parent() {
        ensure_dir(parent)?;
    }

    if let Err(e) = fs::rename(src, dst) {
        tracing::debug!(
            "rename {} -> {} failed ({e}), copying instead",
            src.display(),
            dst.display()
        );
        copy_dir(src, dst)?;
        remove_path(src)?;
    }
    Ok(())
}

/// Atomically writes bytes to a file using a write-then-rename strategy.
///
/// Parent directories are created as needed. Readers see either the old
/// content or the new content, never a partial write.
pub fn atomic_write(path: &Path, content: &[u8]) -> Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    ensure_dir(parent)?;

    let mut temp = tempfile::NamedTempFile::new_in(parent)
        .with_context(|| format!("Failed to create temp file in {}", parent.display()))?;
    temp.write_all(content)
        .with_context(|| format!("Failed to write temp file for {}", path.display()))?;
    temp.as_file().sync_all().context("Failed to sync file to disk")?;
    temp.persist(path).with_context(|| format!("Failed to rename temp file to {}", path.display()))?;

    Ok(())
}

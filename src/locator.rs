//! Locator codec: maps a remote resource locator to a filesystem-safe path.
//!
//! The mapping strips the scheme (`https://`, `ssh://`, ...) and any user-info,
//! splits on `/`, drops empty segments and rejoins the remaining segments with
//! the host separator. It is deterministic and scheme-insensitive, so
//! `https://example.com/a/b` and `example.com/a/b` land in the same directory.
//! It is not invertible.
//!
//! Locators without `://` (scp-style git remotes such as `git@host:org/repo`,
//! bare `host/path` strings) are used as-is.

use anyhow::Result;
use regex::Regex;
use std::path::PathBuf;

use crate::core::FabError;

/// Convert a locator into a relative filesystem path.
///
/// # Errors
///
/// Returns [`FabError::InvalidLocator`] when the locator contains `://` but its
/// scheme is not valid URI scheme syntax, when a segment is `.` or `..`, or
/// when nothing is left after removing the scheme and empty segments.
///
/// # Examples
///
/// ```rust
/// use fab_cli::locator::locator_to_path;
/// use std::path::PathBuf;
///
/// let path = locator_to_path("https://github.com/org/repo").unwrap();
/// assert_eq!(path, PathBuf::from("github.com").join("org").join("repo"));
/// assert_eq!(path, locator_to_path("github.com/org/repo").unwrap());
/// ```
pub fn locator_to_path(locator: &str) -> Result<PathBuf> {
    let without_scheme = strip_scheme(locator)?;

    let segments: Vec<&str> = without_scheme.split('/').filter(|segment| !segment.is_empty()).collect();
    if let Some(relative) = segments.iter().find(|segment| matches!(**segment, "." | "..")) {
        return Err(FabError::InvalidLocator {
            locator: locator.to_string(),
            reason: format!("segment '{relative}' would leave the component directory"),
        }
        .into());
    }

    let path: PathBuf = segments.into_iter().collect();
    if path.as_os_str().is_empty() {
        return Err(FabError::InvalidLocator {
            locator: locator.to_string(),
            reason: "locator has no path segments".to_string(),
        }
        .into());
    }

    Ok(path)
}

fn strip_scheme(locator: &str) -> Result<&str> {
    if !locator.contains("://") {
        return Ok(locator);
    }

    let scheme_re = Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]*://(?P<rest>.*)$")?;
    let Some(captures) = scheme_re.captures(locator) else {
        return Err(FabError::InvalidLocator {
            locator: locator.to_string(),
            reason: "scheme must match [A-Za-z][A-Za-z0-9+.-]*".to_string(),
        }
        .into());
    };
    let rest = captures.name("rest").map_or("", |m| m.as_str());

    // credentials never reach the filesystem
    let authority_end = rest.find('/').unwrap_or(rest.len());
    match rest[..authority_end].rfind('@') {
        Some(at) => Ok(&rest[at + 1..]),
        None => Ok(rest),
    }
}

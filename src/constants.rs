//! Global constants used throughout the fab codebase.
//!
//! Directory names, file names and timeouts that several modules agree on
//! live here so the on-disk layout is defined in exactly one place.

use std::time::Duration;

/// Directory (relative to the workspace root) that fetched components are installed into.
pub const INSTALL_DIR_NAME: &str = "_components";

/// Sub-directory of [`INSTALL_DIR_NAME`] holding copies of local sources.
pub const LOCAL_DIR_NAME: &str = "_local";

/// Directory (relative to the workspace root) that rendered manifests are written to.
pub const GENERATE_DIR_NAME: &str = "_generated";

/// Separator used to join a component's ancestry into its output file name.
pub const COMPONENT_PATH_SEPARATOR: &str = "_";

/// File name of the install report written by `fab install`.
pub const INSTALL_REPORT_NAME: &str = "_install.lock.json";

/// Destination discriminator for fetches that do not pin a version.
pub const LATEST_VERSION: &str = "latest";

/// Conventional chart sub-directory holding manifests that `helm template` skips.
pub const PRE_INSTALL_DIR_NAME: &str = "crds";

/// Separator placed between raw manifest fragments.
pub const DOCUMENT_SEPARATOR: &str = "\n---\n";

/// Default timeout for git operations (5 minutes).
pub const DEFAULT_GIT_TIMEOUT: Duration = Duration::from_secs(300);

/// Default timeout for helm operations (5 minutes).
pub const DEFAULT_HELM_TIMEOUT: Duration = Duration::from_secs(300);

/// Default timeout for plain HTTP downloads (60 seconds).
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(60);

/// Environment variable overriding the global config location.
pub const CONFIG_PATH_ENV: &str = "FAB_CONFIG";

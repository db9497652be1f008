//! Error handling for fab
//!
//! The error system follows two rules:
//! 1. **Strongly-typed errors** ([`FabError`]) for precise handling in code
//! 2. **User-friendly messages** ([`ErrorContext`]) with suggestions for the CLI
//!
//! # Error Categories
//!
//! Every [`FabError`] belongs to one [`ErrorCategory`]:
//! - **Validation**: malformed or missing fields, missing or ambiguous component
//!   definitions, invalid locators. Never retried.
//! - **Fetch**: network, process or checkout-verification failures while
//!   materializing a source.
//! - **Consistency**: duplicate logical paths, unexpected document shapes,
//!   conflicting metadata injection.
//! - **Hook**: a lifecycle hook command failed.
//! - **Io**: plumbing failures (filesystem, configuration).
//!
//! Errors travel as [`anyhow::Error`] with `.with_context(...)` naming the
//! component being processed. Callers that need the typed error recover it with
//! `downcast_ref::<FabError>()`.
//!
//! # Examples
//!
//! ```rust,no_run
//! use fab_cli::core::{ErrorCategory, FabError, user_friendly_error};
//!
//! let error = FabError::InvalidLocator {
//!     locator: "ht!tp://bad".to_string(),
//!     reason: "invalid scheme".to_string(),
//! };
//! assert_eq!(error.category(), ErrorCategory::Validation);
//!
//! let ctx = user_friendly_error(anyhow::Error::from(error));
//! ctx.display();
//! ```

use colored::Colorize;
use std::fmt;
use thiserror::Error;

/// The main error type for fab operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FabError {
    /// A component declaration failed validation (e.g. its name contains a path separator)
    #[error("Invalid component '{name}': {reason}")]
    InvalidComponent {
        /// Name (or logical path) of the offending component
        name: String,
        /// What is wrong with it
        reason: String,
    },

    /// A locator could not be mapped to a filesystem path
    #[error("Invalid locator '{locator}': {reason}")]
    InvalidLocator {
        /// The locator as written in the component definition
        locator: String,
        /// Why it was rejected
        reason: String,
    },

    /// A fetch coordinate is missing fields or carries inconsistent ones
    #[error("Invalid source for component '{component}': {reason}")]
    InvalidSource {
        /// Logical path (or locator) of the component
        component: String,
        /// Why the coordinate was rejected
        reason: String,
    },

    /// No `component.(yaml|yml|json)` exists in the directory
    #[error("No component definition found in {directory}")]
    DefinitionNotFound {
        /// Directory that was searched
        directory: String,
    },

    /// More than one definition file exists in the directory
    #[error("Multiple component definitions in {directory}: '{first}' and '{second}'")]
    AmbiguousDefinition {
        /// Directory containing the definitions
        directory: String,
        /// First definition file found
        first: String,
        /// Second definition file found
        second: String,
    },

    /// A definition file exists but could not be parsed
    #[error("Invalid component definition {file}")]
    DefinitionParseError {
        /// Path of the definition file
        file: String,
        /// Parser diagnostic
        reason: String,
    },

    /// A render backend was configured incorrectly
    #[error("Invalid generator for component '{component}': {reason}")]
    InvalidGenerator {
        /// Logical path of the component
        component: String,
        /// Why the generator cannot run
        reason: String,
    },

    /// `fab generate` found a remote component that `fab install` never recorded
    #[error("Component '{logical_path}' is not installed")]
    NotInstalled {
        /// Logical path that is missing from the install report
        logical_path: String,
    },

    /// A required external tool is not on PATH
    #[error("'{tool}' is not installed or not found in PATH")]
    ToolNotFound {
        /// Executable name
        tool: String,
    },

    /// Fetching a source failed for a reason not covered by a more specific variant
    #[error("Failed to fetch {target}")]
    FetchFailed {
        /// Locator or destination being fetched
        target: String,
        /// Underlying failure
        reason: String,
    },

    /// A git command returned a non-zero exit code or timed out
    #[error("Git operation failed: {operation}")]
    GitCommandError {
        /// The git sub-command that failed
        operation: String,
        /// The error output from the git command
        stderr: String,
    },

    /// `git clone` failed
    #[error("Failed to clone repository: {url}")]
    GitCloneFailed {
        /// Repository URL with credentials removed
        url: String,
        /// The reason for the clone failure
        reason: String,
    },

    /// `git checkout` failed
    #[error("Failed to checkout reference '{reference}' in repository")]
    GitCheckoutFailed {
        /// The reference that failed to check out
        reference: String,
        /// The reason for the checkout failure
        reason: String,
    },

    /// The checked-out HEAD does not match the requested revision or branch
    #[error("Repository at {path} is at '{actual}', expected '{expected}'")]
    RevisionMismatch {
        /// Checkout directory
        path: String,
        /// Requested sha or branch
        expected: String,
        /// What HEAD actually points at
        actual: String,
    },

    /// A helm command failed or wrote to stderr
    #[error("Helm operation failed: {operation}")]
    HelmCommandError {
        /// The helm sub-command that failed
        operation: String,
        /// Diagnostic output
        stderr: String,
    },

    /// The installed helm is not a supported major version
    #[error("Unsupported helm version: {version}")]
    UnsupportedHelmVersion {
        /// Version string reported by `helm version`
        version: String,
    },

    /// An HTTP transfer failed
    #[error("Network error: {operation}")]
    NetworkError {
        /// What was being downloaded
        operation: String,
        /// Transport or status failure
        reason: String,
    },

    /// Loading SSH identities into the agent failed
    #[error("Failed to add ssh identities: {reason}")]
    SshAgentError {
        /// Output of `ssh-add`
        reason: String,
    },

    /// Two different components of one tree share a logical path
    #[error("Duplicate component '{logical_path}': declared with content at both {existing} and {new}")]
    DuplicateLogicalPath {
        /// The shared logical path
        logical_path: String,
        /// Content location of the first declaration
        existing: String,
        /// Content location of the second declaration
        new: String,
    },

    /// A rendered document does not have the shape an operation requires
    #[error("Unexpected document shape: {reason}")]
    UnexpectedDocumentShape {
        /// Description of the mismatch
        reason: String,
    },

    /// Namespace injection found a different namespace already declared
    #[error("Cannot inject namespace '{namespace}': document already declares namespace '{existing}'")]
    NamespaceConflict {
        /// Namespace being injected
        namespace: String,
        /// Namespace already present
        existing: String,
    },

    /// A lifecycle hook command exited unsuccessfully
    #[error("Hook '{hook}' failed running `{command}`")]
    HookFailed {
        /// Hook name (e.g. "after-install")
        hook: String,
        /// The shell command
        command: String,
        /// Exit status and captured stderr
        reason: String,
    },

    /// A filesystem operation failed
    #[error("File system error: {operation} {path}")]
    FileSystemError {
        /// Operation being performed
        operation: String,
        /// Path involved
        path: String,
    },

    /// The global configuration could not be used
    #[error("Configuration error: {message}")]
    ConfigError {
        /// Description of the configuration error
        message: String,
    },

    /// Catch-all for errors without a dedicated variant
    #[error("{message}")]
    Other {
        /// Full error message
        message: String,
    },
}

/// Coarse classification of a [`FabError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Malformed input. Rerunning without changes fails the same way.
    Validation,
    /// Materializing a source failed.
    Fetch,
    /// The resolved tree or a rendered document contradicts itself.
    Consistency,
    /// A lifecycle hook failed.
    Hook,
    /// Filesystem, configuration or other plumbing failure.
    Io,
}

impl FabError {
    /// Returns the category this error belongs to.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidComponent {
                ..
            }
            | Self::InvalidLocator {
                ..
            }
            | Self::InvalidSource {
                ..
            }
            | Self::DefinitionNotFound {
                ..
            }
            | Self::AmbiguousDefinition {
                ..
            }
            | Self::DefinitionParseError {
                ..
            }
            | Self::InvalidGenerator {
                ..
            }
            | Self::NotInstalled {
                ..
            } => ErrorCategory::Validation,
            Self::ToolNotFound {
                ..
            }
            | Self::FetchFailed {
                ..
            }
            | Self::GitCommandError {
                ..
            }
            | Self::GitCloneFailed {
                ..
            }
            | Self::GitCheckoutFailed {
                ..
            }
            | Self::RevisionMismatch {
                ..
            }
            | Self::HelmCommandError {
                ..
            }
            | Self::UnsupportedHelmVersion {
                ..
            }
            | Self::NetworkError {
                ..
            }
            | Self::SshAgentError {
                ..
            } => ErrorCategory::Fetch,
            Self::DuplicateLogicalPath {
                ..
            }
            | Self::UnexpectedDocumentShape {
                ..
            }
            | Self::NamespaceConflict {
                ..
            } => ErrorCategory::Consistency,
            Self::HookFailed {
                ..
            } => ErrorCategory::Hook,
            Self::FileSystemError {
                ..
            }
            | Self::ConfigError {
                ..
            }
            | Self::Other {
                ..
            } => ErrorCategory::Io,
        }
    }
}

/// Returns the category of the first [`FabError`] found in an error chain.
#[must_use]
pub fn error_category(error: &anyhow::Error) -> Option<ErrorCategory> {
    error.chain().find_map(|cause| cause.downcast_ref::<FabError>()).map(FabError::category)
}

/// Error wrapper carrying a suggestion and details for terminal display.
#[derive(Debug)]
pub struct ErrorContext {
    /// The underlying error
    pub error: FabError,
    /// Optional suggestion for resolving the error
    pub suggestion: Option<String>,
    /// Optional additional details about the error
    pub details: Option<String>,
}

impl ErrorContext {
    /// Create a new error context with no suggestion or details.
    #[must_use]
    pub const fn new(error: FabError) -> Self {
        Self {
            error,
            suggestion: None,
            details: None,
        }
    }

    /// Add a suggestion for resolving the error. Displayed in green.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Add additional details explaining the error. Displayed in yellow.
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Print the error, details and suggestion to stderr with terminal colors.
    pub fn display(&self) {
        eprintln!("{}: {}", "error".red().bold(), self.error);

        if let Some(details) = &self.details {
            eprintln!("{}: {}", "details".yellow(), details);
        }

        if let Some(suggestion) = &self.suggestion {
            eprintln!("{}: {}", "suggestion".green(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;

        if let Some(details) = &self.details {
            write!(f, "\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}

impl std::error::Error for ErrorContext {}

/// Convert any error into an [`ErrorContext`] with a suggestion where one is known.
///
/// The whole `anyhow` chain is searched for a [`FabError`], so an error wrapped in
/// `.with_context("installing component 'root/app'")` still gets the suggestion for
/// its root cause, while the context messages are kept as details.
#[must_use]
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    let trail = context_trail(&error);

    if let Some(fab_error) = error.chain().find_map(|cause| cause.downcast_ref::<FabError>()) {
        let ctx = create_error_context(fab_error.clone());
        return match (trail, ctx.details.clone()) {
            (Some(trail), Some(details)) => ctx.with_details(format!("{details}\n{trail}")),
            (Some(trail), None) => ctx.with_details(trail),
            (None, _) => ctx,
        };
    }

    if let Some(io_error) = error.chain().find_map(|cause| cause.downcast_ref::<std::io::Error>())
    {
        match io_error.kind() {
            std::io::ErrorKind::PermissionDenied => {
                return ErrorContext::new(FabError::FileSystemError {
                    operation: "access".to_string(),
                    path: error.to_string(),
                })
                .with_suggestion("Check file ownership and permissions of the workspace");
            }
            std::io::ErrorKind::NotFound => {
                return ErrorContext::new(FabError::FileSystemError {
                    operation: "read".to_string(),
                    path: error.to_string(),
                })
                .with_suggestion("Check that the file or directory exists and the path is correct");
            }
            _ => {}
        }
    }

    if let Some(toml_error) = error.downcast_ref::<toml::de::Error>() {
        return ErrorContext::new(FabError::ConfigError {
            message: toml_error.to_string(),
        })
        .with_suggestion("Check the TOML syntax of your fab configuration file");
    }

    let mut message = error.to_string();
    let chain: Vec<String> = error.chain().skip(1).map(std::string::ToString::to_string).collect();
    if !chain.is_empty() {
        message.push_str("\n\nCaused by:");
        for (i, cause) in chain.iter().enumerate() {
            message.push_str(&format!("\n  {}: {}", i + 1, cause));
        }
    }

    ErrorContext::new(FabError::Other {
        message,
    })
}

/// Context messages layered on top of the root cause, outermost first.
fn context_trail(error: &anyhow::Error) -> Option<String> {
    let contexts: Vec<String> = error
        .chain()
        .take_while(|cause| cause.downcast_ref::<FabError>().is_none())
        .map(std::string::ToString::to_string)
        .collect();
    if contexts.is_empty() {
        None
    } else {
        Some(contexts.join(": "))
    }
}

fn create_error_context(error: FabError) -> ErrorContext {
    match &error {
        FabError::InvalidComponent {
            ..
        } => ErrorContext::new(error)
            .with_suggestion("Component names must not contain '/' or '\\'"),

        FabError::InvalidLocator {
            ..
        } => ErrorContext::new(error)
            .with_suggestion("Use a locator such as 'https://host/org/repo' or 'host/org/repo'"),

        FabError::InvalidSource {
            ..
        } => ErrorContext::new(error).with_suggestion(
            "Check the component's 'method', 'source', 'path', 'version' and 'branch' fields",
        ),

        FabError::DefinitionNotFound {
            ..
        } => ErrorContext::new(error)
            .with_suggestion("Create a component.yaml (or component.json) in the directory"),

        FabError::AmbiguousDefinition {
            ..
        } => ErrorContext::new(error)
            .with_suggestion("Keep exactly one of component.yaml, component.yml or component.json"),

        FabError::DefinitionParseError {
            reason,
            ..
        } => {
            let details = reason.clone();
            ErrorContext::new(error)
                .with_suggestion("Valid types are component, helm and static; valid methods are git, helm, local and http")
                .with_details(details)
        }

        FabError::NotInstalled {
            ..
        } => ErrorContext::new(error).with_suggestion("Run 'fab install' before 'fab generate'"),

        FabError::ToolNotFound {
            tool,
        } => {
            let suggestion = format!("Install {tool} and make sure it is on your PATH");
            ErrorContext::new(error).with_suggestion(suggestion)
        }

        FabError::GitCommandError {
            stderr,
            ..
        }
        | FabError::GitCloneFailed {
            reason: stderr,
            ..
        }
        | FabError::GitCheckoutFailed {
            reason: stderr,
            ..
        } => {
            let details = stderr.trim().to_string();
            ErrorContext::new(error)
                .with_suggestion(
                    "Check the repository URL, your network connection and that the revision exists",
                )
                .with_details(details)
        }

        FabError::RevisionMismatch {
            ..
        } => ErrorContext::new(error).with_suggestion(
            "Pin 'version' to a full commit sha, or 'branch' to a branch (not a tag) name",
        ),

        FabError::HelmCommandError {
            stderr,
            ..
        } => {
            let details = stderr.trim().to_string();
            ErrorContext::new(error)
                .with_suggestion("Run the helm command manually to inspect the chart")
                .with_details(details)
        }

        FabError::UnsupportedHelmVersion {
            ..
        } => ErrorContext::new(error).with_suggestion("Install helm 3 or newer"),

        FabError::NetworkError {
            reason,
            ..
        }
        | FabError::FetchFailed {
            reason,
            ..
        } => {
            let details = reason.clone();
            ErrorContext::new(error)
                .with_suggestion("Check your network connection and rerun 'fab install'")
                .with_details(details)
        }

        FabError::SshAgentError {
            ..
        } => ErrorContext::new(error)
            .with_suggestion("Start an ssh-agent ('eval $(ssh-agent)') or set ssh_agent = false"),

        FabError::DuplicateLogicalPath {
            ..
        } => ErrorContext::new(error).with_suggestion(
            "Rename one of the components so every component has a unique ancestry",
        ),

        FabError::NamespaceConflict {
            ..
        } => ErrorContext::new(error).with_suggestion(
            "Remove the namespace from the chart output or disable injectNamespace",
        ),

        FabError::HookFailed {
            reason,
            ..
        } => {
            let details = reason.trim().to_string();
            ErrorContext::new(error)
                .with_suggestion("Run the hook command manually from the component directory")
                .with_details(details)
        }

        FabError::ConfigError {
            ..
        } => ErrorContext::new(error)
            .with_suggestion("Check ~/.fab/config.toml (or the file named by FAB_CONFIG)"),

        FabError::InvalidGenerator {
            ..
        }
        | FabError::UnexpectedDocumentShape {
            ..
        }
        | FabError::FileSystemError {
            ..
        }
        | FabError::Other {
            ..
        } => ErrorContext::new(error),
    }
}

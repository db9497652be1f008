//! Core types shared by every fab module.
//!
//! Currently this is the error taxonomy:
//! - [`FabError`] - enumerated failure cases, grouped by [`ErrorCategory`]
//! - [`ErrorContext`] - user-facing wrapper with suggestions and details
//! - [`user_friendly_error`] - converts any [`anyhow::Error`] for CLI display
//!
//! # Examples
//!
//! ```rust
//! use fab_cli::core::{FabError, user_friendly_error};
//! use anyhow::Result;
//!
//! fn load() -> Result<()> {
//!     Err(FabError::DefinitionNotFound { directory: ".".to_string() }.into())
//! }
//!
//! if let Err(e) = load() {
//!     let friendly = user_friendly_error(e);
//!     assert!(friendly.suggestion.is_some());
//! }
//! ```

pub mod error;

pub use error::{ErrorCategory, ErrorContext, FabError, error_category, user_friendly_error};

//! Configuration for fab.
//!
//! - [`GlobalConfig`] - user-wide settings from `~/.fab/config.toml`
//! - [`AccessTokens`] - concurrent token store fed from the global config
//!
//! Component trees carry their own per-component configuration; see
//! [`crate::component::ComponentConfig`].

mod global;
mod tokens;

pub use global::GlobalConfig;
pub use tokens::AccessTokens;

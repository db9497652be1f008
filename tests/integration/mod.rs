//! Integration test suite for fab.
//!
//! ```bash
//! cargo test --test integration
//! ```
//!
//! - **install**: tree walk, install report, duplicate detection, hooks
//! - **generate**: rendering static components end to end
//! - **git_source**: git fetches against local `file://` repositories
//! - **cli**: the `fab` binary end to end

#[path = "../common/mod.rs"]
mod common;

mod cli;
mod generate;
mod git_source;
mod install;

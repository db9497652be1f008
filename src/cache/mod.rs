//! Fetch coordination.
//!
//! fab has no cache that outlives a run: every install clears and refetches
//! each destination. Within one run, [`CloneCoordinator`] makes sure a
//! destination is fetched once no matter how many components point at it.

pub mod coordinator;

pub use coordinator::{CloneCoordinator, FetchOutcome};

//! Single-flight coordination of fetches keyed by destination path.
//!
//! Every fetch fab performs writes into a deterministic destination, so two
//! components that point at the same repository revision (or chart version,
//! or URL) would clobber each other if fetched concurrently. The
//! [`CloneCoordinator`] guarantees at most one fetch per destination at any
//! instant and that repeated requests for a destination in the same process
//! do not repeat the work.
//!
//! # Protocol
//!
//! The [`DashMap`] shard lock is the coarse lock: it guards only the lookup
//! or creation of a destination's entry. For a destination `D`:
//!
//! - **no entry**: create one holding an unset outcome, take the exclusive
//!   hold on it while the shard lock is still held, release the shard lock,
//!   run the fetch, record its outcome, release.
//! - **entry exists**: release the shard lock, take a shared hold (waiting for
//!   any in-flight fetch), observe the recorded outcome, release.
//!
//! An outcome that is still unset when a shared hold is obtained means the
//! fetching future was dropped before it finished; waiters fail instead of
//! assuming the destination is complete. Entries are never removed.

use anyhow::Result;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::{OwnedRwLockWriteGuard, RwLock};

use crate::core::FabError;

/// Recorded result of the one fetch performed for a destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Succeeded,
    /// The fetch failed; holds the rendered error chain.
    Failed(String),
}

type Slot = Arc<RwLock<Option<FetchOutcome>>>;

enum Claim {
    Leader(OwnedRwLockWriteGuard<Option<FetchOutcome>>),
    Follower(Slot),
}

/// Process-wide lock table for fetch destinations.
///
/// Created once per run and shared as `Arc<CloneCoordinator>`.
#[derive(Debug, Default)]
pub struct CloneCoordinator {
    locks: DashMap<PathBuf, Slot>,
    fetches: AtomicUsize,
}

impl CloneCoordinator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `fetch` for `dest` unless it has already run (or is running).
    ///
    /// The caller that performs the fetch gets its result unchanged. Every
    /// other caller waits for that fetch and then succeeds or fails with it.
    ///
    /// # Errors
    ///
    /// - whatever `fetch` returned, for the caller that ran it
    /// - [`FabError::FetchFailed`] naming `dest` for callers that observed a
    ///   failed or interrupted fetch
    pub async fn run<F, Fut>(&self, dest: &Path, fetch: F) -> Result<()>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        match self.claim(dest) {
            Claim::Leader(mut guard) => {
                self.fetches.fetch_add(1, Ordering::SeqCst);
                tracing::debug!(target: "fab::coordinator", "Fetching {}", dest.display());

                let result = fetch().await;
                *guard = Some(match &result {
                    Ok(()) => FetchOutcome::Succeeded,
                    Err(e) => FetchOutcome::Failed(format!("{e:#}")),
                });
                result
            }
            Claim::Follower(slot) => {
                tracing::debug!(
                    target: "fab::coordinator",
                    "Waiting for fetch of {}",
                    dest.display()
                );
                let outcome = slot.read().await;
                match outcome.as_ref() {
                    Some(FetchOutcome::Succeeded) => Ok(()),
                    Some(FetchOutcome::Failed(reason)) => Err(FabError::FetchFailed {
                        target: dest.display().to_string(),
                        reason: reason.clone(),
                    }
                    .into()),
                    None => Err(FabError::FetchFailed {
                        target: dest.display().to_string(),
                        reason: "fetch was interrupted before it completed".to_string(),
                    }
                    .into()),
                }
            }
        }
    }

    // The shard guard held by `entry` is the coarse lock; it is released when
    // this function returns, after the leader already owns the write hold.
    fn claim(&self, dest: &Path) -> Claim {
        match self.locks.entry(dest.to_path_buf()) {
            Entry::Occupied(entry) => Claim::Follower(Arc::clone(entry.get())),
            Entry::Vacant(entry) => {
                let slot: Slot = Arc::new(RwLock::new(None));
                let claim = match Arc::clone(&slot).try_write_owned() {
                    Ok(guard) => Claim::Leader(guard),
                    Err(_) => Claim::Follower(Arc::clone(&slot)),
                };
                entry.insert(slot);
                claim
            }
        }
    }

    /// Number of fetches actually started.
    #[must_use]
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    /// Outcome recorded for `dest`, if a fetch for it has finished.
    #[must_use]
    pub fn outcome(&self, dest: &Path) -> Option<FetchOutcome> {
        let slot = self.locks.get(dest).map(|entry| Arc::clone(entry.value()))?;
        let outcome = slot.try_read().ok()?.clone();
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::sync::{Barrier, Notify};

    #[tokio::test]
    async fn test_concurrent_requests_fetch_once() {
        let coordinator = Arc::new(CloneCoordinator::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let dest = PathBuf::from("/work/_components/github.com/org/repo/latest");

        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let coordinator = Arc::clone(&coordinator);
                let calls = Arc::clone(&calls);
                let dest = dest.clone();
                tokio::spawn(async move {
                    coordinator
                        .run(&dest, || async move {
                            calls.fetch_add(1, Ordering::SeqCst);
                            tokio::time::sleep(Duration::from_millis(50)).await;
                            Ok(())
                        })
                        .await
                })
            })
            .collect();

        for result in futures::future::join_all(tasks).await {
            result.unwrap().unwrap();
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(coordinator.fetch_count(), 1);
        assert_eq!(coordinator.outcome(&dest), Some(FetchOutcome::Succeeded));
    }

    #[tokio::test]
    async fn test_failure_propagates_to_every_caller() {
        let coordinator = Arc::new(CloneCoordinator::new());
        let dest = PathBuf::from("/work/_components/example.com/chart/1.0.0");

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let coordinator = Arc::clone(&coordinator);
                let dest = dest.clone();
                tokio::spawn(async move {
                    coordinator
                        .run(&dest, || async {
                            tokio::time::sleep(Duration::from_millis(50)).await;
                            Err(anyhow::anyhow!("remote hung up"))
                        })
                        .await
                })
            })
            .collect();

        let errors: Vec<_> = futures::future::join_all(tasks)
            .await
            .into_iter()
            .map(|result| result.unwrap().unwrap_err())
            .collect();
        assert_eq!(errors.len(), 8);
        assert!(errors.iter().all(|e| format!("{e:#}").contains("remote hung up")
            || matches!(
                e.downcast_ref::<FabError>(),
                Some(FabError::FetchFailed { reason, .. }) if reason.contains("remote hung up")
            )));
        assert_eq!(coordinator.fetch_count(), 1);

        // later callers observe the same failure without fetching again
        let late = coordinator.run(&dest, || async { Ok(()) }).await.unwrap_err();
        assert!(matches!(late.downcast_ref::<FabError>(), Some(FabError::FetchFailed { .. })));
        assert_eq!(coordinator.fetch_count(), 1);
    }

    #[tokio::test]
    async fn test_distinct_destinations_run_in_parallel() {
        let coordinator = Arc::new(CloneCoordinator::new());
        let barrier = Arc::new(Barrier::new(2));

        let tasks: Vec<_> = ["a", "b"]
            .into_iter()
            .map(|name| {
                let coordinator = Arc::clone(&coordinator);
                let barrier = Arc::clone(&barrier);
                tokio::spawn(async move {
                    coordinator
                        .run(Path::new(name), || async move {
                            // both fetches must be in flight at once to get past this
                            barrier.wait().await;
                            Ok(())
                        })
                        .await
                })
            })
            .collect();

        let joined =
            tokio::time::timeout(Duration::from_secs(5), futures::future::join_all(tasks)).await.unwrap();
        for result in joined {
            result.unwrap().unwrap();
        }
        assert_eq!(coordinator.fetch_count(), 2);
    }

    #[tokio::test]
    async fn test_interrupted_fetch_fails_waiters() {
        let coordinator = Arc::new(CloneCoordinator::new());
        let started = Arc::new(Notify::new());
        let dest = PathBuf::from("/work/_components/slow");

        let leader = {
            let coordinator = Arc::clone(&coordinator);
            let started = Arc::clone(&started);
            let dest = dest.clone();
            tokio::spawn(async move {
                coordinator
                    .run(&dest, || async move {
                        started.notify_one();
                        std::future::pending::<()>().await;
                        Ok(())
                    })
                    .await
            })
        };
        started.notified().await;

        let follower = {
            let coordinator = Arc::clone(&coordinator);
            let dest = dest.clone();
            tokio::spawn(async move { coordinator.run(&dest, || async { Ok(()) }).await })
        };

        leader.abort();
        let err = follower.await.unwrap().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<FabError>(),
            Some(FabError::FetchFailed { reason, .. }) if reason.contains("interrupted")
        ));
        assert_eq!(coordinator.outcome(&dest), None);
    }
}

//! Physical file lifetime.
//!
//! Every removal of an uploaded payload goes through [`FileLifecycle`].
//! Deletion is advisory cleanup: the outcome is returned as a [`Cleanup`]
//! value for logging and tests, and is never turned into an error.

use futures::future::join_all;
use std::{
    io::{self, ErrorKind},
    path::{Path, PathBuf},
    time::Duration,
};
use tokio::{fs, time::timeout};
use tracing::{debug, warn};

/// Upper bound on how long a single cleanup may hold up a response.
pub const DEFAULT_CLEANUP_TIMEOUT: Duration = Duration::from_secs(5);

/// Outcome of a best-effort deletion.
#[derive(Debug)]
pub enum Cleanup {
    Removed,
    AlreadyMissing,
    Failed(io::Error),
    TimedOut,
}

impl Cleanup {
    /// True when the file is known to be gone afterwards.
    pub fn is_gone(&self) -> bool {
        matches!(self, Cleanup::Removed | Cleanup::AlreadyMissing)
    }
}

#[derive(Clone, Debug)]
pub struct FileLifecycle {
    timeout: Duration,
}

impl Default for FileLifecycle {
    fn default() -> Self {
        Self::new(DEFAULT_CLEANUP_TIMEOUT)
    }
}

impl FileLifecycle {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Remove `path`, logging instead of failing.
    pub async fn delete_best_effort(&self, path: &Path) -> Cleanup {
        let outcome = match timeout(self.timeout, fs::remove_file(path)).await {
            Ok(Ok(())) => Cleanup::Removed,
            Ok(Err(err)) if err.kind() == ErrorKind::NotFound => Cleanup::AlreadyMissing,
            Ok(Err(err)) => Cleanup::Failed(err),
            Err(_) => Cleanup::TimedOut,
        };

        match &outcome {
            Cleanup::Removed => debug!("removed physical file {}", path.display()),
            Cleanup::AlreadyMissing => debug!("file {} already missing", path.display()),
            Cleanup::Failed(err) => warn!("failed to delete file {}: {}", path.display(), err),
            Cleanup::TimedOut => warn!(
                "deleting file {} did not finish within {:?}",
                path.display(),
                self.timeout
            ),
        }

        outcome
    }

    /// Remove several files concurrently. Used on rollback paths.
    pub async fn delete_all_best_effort<I>(&self, paths: I) -> Vec<Cleanup>
    where
        I: IntoIterator<Item = PathBuf>,
    {
        let paths: Vec<PathBuf> = paths.into_iter().collect();
        if paths.is_empty() {
            return Vec::new();
        }
        debug!("cleaning up {} orphaned file(s)", paths.len());
        let outcomes = join_all(paths.iter().map(|p| self.delete_best_effort(p))).await;

        let left = outcomes.iter().filter(|c| !c.is_gone()).count();
        if left > 0 {
            warn!("{} of {} file(s) could not be removed", left, outcomes.len());
        }
        outcomes
    }
}

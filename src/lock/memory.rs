//! In-process lease service for single-process runs and tests.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, instrument};

use crate::lock::{Lease, LockError, LockService};

type PathMutex = Arc<tokio::sync::Mutex<()>>;
type PathTable = Arc<Mutex<HashMap<String, PathMutex>>>;

/// Leases backed by one `tokio::sync::Mutex` per path.
///
/// Clones share the same table, so two nodes in one process contend for the
/// same paths. A path's entry is dropped once nobody holds or awaits it.
#[derive(Debug, Clone, Default)]
pub struct MemoryLocks {
    paths: PathTable,
}

impl MemoryLocks {
    /// Creates an empty lease table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of paths currently held or awaited.
    pub fn tracked_paths(&self) -> usize {
        self.paths.lock().len()
    }
}

/// Removes `path` from the table if the caller's handle is the only one
/// left besides the table's own.
fn prune(paths: &PathTable, path: &str, mutex: &PathMutex) {
    let mut table = paths.lock();
    let unused = table
        .get(path)
        .is_some_and(|entry| Arc::ptr_eq(entry, mutex) && Arc::strong_count(mutex) == 2);
    if unused {
        table.remove(path);
    }
}

#[async_trait]
impl LockService for MemoryLocks {
    #[instrument(skip(self))]
    async fn acquire(&self, path: &str, wait: Duration) -> Result<Box<dyn Lease>, LockError> {
        let mutex = self.paths.lock().entry(path.to_string()).or_default().clone();

        let guard = match tokio::time::timeout(wait, mutex.clone().lock_owned()).await {
            Ok(guard) => guard,
            Err(_) => {
                prune(&self.paths, path, &mutex);
                return Err(LockError::new(format!(
                    "Timed out after {:?} waiting for '{}'",
                    wait, path
                )));
            }
        };

        debug!("Memory lease acquired");
        Ok(Box::new(MemoryLease {
            paths: self.paths.clone(),
            path: path.to_string(),
            mutex: Some(mutex),
            guard: Some(guard),
        }))
    }
}

struct MemoryLease {
    paths: PathTable,
    path: String,
    mutex: Option<PathMutex>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl MemoryLease {
    fn give_back(&mut self) {
        drop(self.guard.take());
        if let Some(mutex) = self.mutex.take() {
            prune(&self.paths, &self.path, &mutex);
        }
    }
}

#[async_trait]
impl Lease for MemoryLease {
    async fn release(&mut self) -> Result<(), LockError> {
        self.give_back();
        Ok(())
    }
}

impl Drop for MemoryLease {
    fn drop(&mut self) {
        self.give_back();
    }
}

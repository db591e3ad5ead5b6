//! Lock-bracketed critical sections.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use derive_more::Display;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::error::{DuelError, DuelErrorKind};
use crate::lock::LockService;

/// The named leases the coordinators use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum LockPath {
    /// Global lease serializing every join handshake.
    #[display("/joingame")]
    Join,
    /// Per-game lease around read, decide and write of an incoming move.
    #[display("/applyMoveLock/{}", _0)]
    ApplyMove(Uuid),
    /// Per-game lease around status recomputation.
    #[display("/isGameOverLock/{}", _0)]
    GameOver(Uuid),
}

/// Runs closures while holding a lease on a [`LockPath`].
#[derive(Debug, Clone)]
pub struct LockGateway {
    service: Arc<dyn LockService>,
    wait: Duration,
}

impl LockGateway {
    /// Creates a gateway over `service` with the given bounded wait.
    pub fn new(service: Arc<dyn LockService>, wait: Duration) -> Self {
        Self { service, wait }
    }

    /// Runs `body` while holding a fresh lease on `path`.
    ///
    /// The lease is released on every exit path; if the returned future is
    /// dropped mid-body, the lease's own drop gives it up.
    ///
    /// # Errors
    ///
    /// - [`DuelErrorKind::LockUnavailable`] if the lease cannot be acquired; `body` does not run.
    /// - Any error `body` returns, even when the release also failed.
    /// - [`DuelErrorKind::LockReleaseFailed`] if `body` succeeded but the release failed.
    #[instrument(skip_all, fields(path = %path))]
    pub async fn with_lock<T, F, Fut>(&self, path: LockPath, body: F) -> Result<T, DuelError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, DuelError>>,
    {
        let path = path.to_string();
        let mut lease = self
            .service
            .acquire(&path, self.wait)
            .await
            .map_err(|e| DuelError::new(DuelErrorKind::LockUnavailable(e)))?;
        debug!("Lease acquired");

        let result = body().await;
        let released = lease.release().await;

        match (result, released) {
            (Ok(value), Ok(())) => {
                debug!("Lease released");
                Ok(value)
            }
            (Ok(_), Err(e)) => Err(DuelError::new(DuelErrorKind::LockReleaseFailed(e))),
            (Err(body_err), Ok(())) => Err(body_err),
            (Err(body_err), Err(release_err)) => {
                warn!(error = %release_err, "Lease release failed after body error");
                Err(body_err)
            }
        }
    }
}

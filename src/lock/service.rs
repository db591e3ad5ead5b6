//! Seam between the gateway and a concrete coordination service.

use std::time::Duration;

use async_trait::async_trait;

use crate::lock::LockError;

/// A named lease service with bounded-wait acquisition.
#[async_trait]
pub trait LockService: Send + Sync + std::fmt::Debug {
    /// Acquires the lease at `path`, waiting at most `wait`.
    ///
    /// # Errors
    ///
    /// Returns [`LockError`] on timeout or when the service is unreachable.
    async fn acquire(&self, path: &str, wait: Duration) -> Result<Box<dyn Lease>, LockError>;
}

/// A held lease.
///
/// Dropping a lease that was never released must still give it up, so a
/// cancelled critical section cannot leave its path locked.
#[async_trait]
pub trait Lease: Send {
    /// Gives the lease back. Releasing twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`LockError`] if the service rejects the release.
    async fn release(&mut self) -> Result<(), LockError>;
}

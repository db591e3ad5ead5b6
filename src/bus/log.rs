//! Seam between the bus adapter and a concrete append-only log.

use std::time::Duration;

use async_trait::async_trait;
use derive_getters::Getters;
use derive_new::new;

use crate::bus::BusError;

/// One entry read from a stream.
#[derive(Debug, Clone, PartialEq, Eq, Getters, new)]
pub struct LogRecord {
    /// Offset assigned by the log on append.
    offset: String,
    /// JSON-encoded message.
    payload: String,
}

/// The two logical streams a match runs over.
#[derive(Debug, Clone, PartialEq, Eq, Getters, new)]
pub struct StreamNames {
    /// Game lifecycle events (`NEW`, `IN_PROGRESS`).
    lifecycle: String,
    /// Move messages.
    moves: String,
}

/// Append-only log with consumer groups.
///
/// A consumer group sees every record appended after the group was created,
/// each one once per group; two processes with distinct groups each see all
/// traffic.
#[async_trait]
pub trait MessageLog: Send + Sync + std::fmt::Debug {
    /// Appends a payload and returns its offset.
    ///
    /// # Errors
    ///
    /// Returns [`BusError`] if the log rejects the write.
    async fn append(&self, stream: &str, payload: &str) -> Result<String, BusError>;

    /// Creates `group` on `stream` if missing, starting at the stream's end.
    ///
    /// # Errors
    ///
    /// Returns [`BusError`] if the log is unreachable.
    async fn ensure_group(&self, stream: &str, group: &str) -> Result<(), BusError>;

    /// Reads up to `max` undelivered records for `group`, waiting at most
    /// `block` for the first one.
    ///
    /// # Errors
    ///
    /// Returns [`BusError`] if the log is unreachable.
    async fn read_group(
        &self,
        stream: &str,
        group: &str,
        consumer: &str,
        max: usize,
        block: Duration,
    ) -> Result<Vec<LogRecord>, BusError>;

    /// Re-reads up to `max` records delivered to `consumer` in `group` but
    /// never acknowledged, oldest first, starting after offset `after` (from
    /// the beginning when `None`). Never blocks.
    ///
    /// # Errors
    ///
    /// Returns [`BusError`] if the log is unreachable.
    async fn read_pending(
        &self,
        stream: &str,
        group: &str,
        consumer: &str,
        after: Option<&str>,
        max: usize,
    ) -> Result<Vec<LogRecord>, BusError>;

    /// Marks a record as processed by `group`.
    ///
    /// # Errors
    ///
    /// Returns [`BusError`] if the log is unreachable.
    async fn ack(&self, stream: &str, group: &str, offset: &str) -> Result<(), BusError>;
}
